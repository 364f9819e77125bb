//! Canonical scenarios.
//!
//! Every scenario of [`all`] follows the contract selected by
//! [`HarnessConfig::model`], so a collaborator honouring that contract passes
//! all of them. Where a contract choice changes the expected outcome the
//! scenario comes in two variants; [`alternatives`] returns the variants of
//! the choices the configuration did not make.

use ptemeta_core::{
    ErrorKind, InlineTag, Lifecycle, Mdp, MetadataValue, ModelConfig, Operation, UnsetRead,
};

use super::{Assertion, Expect, Scenario, Step, ValueSpec};
use crate::HarnessConfig;

/// Inline value used by the single-page scenarios.
pub const INLINE_VALUE: u64 = 0xCAFE_BABE;

/// Full 64-bit word used by `inline-direct-word`.
pub const DIRECT_WORD: u64 = 0xCAFE_BABE_DEAD_BEEF;

/// Payload used by `structured`.
pub const STRUCTURED_PAYLOAD: [u8; 16] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF,
];

/// Header `version` used by `structured`.
pub const STRUCTURED_VERSION: u32 = 1;

/// Header `kind` used by `structured`.
pub const STRUCTURED_KIND: u32 = 0x1234;

/// Number of pages used by `multi-page`.
pub const MULTI_PAGE_COUNT: usize = 4;

/// Returns every canonical scenario of the configured contract.
pub fn all(config: &HarnessConfig) -> Vec<Scenario> {
    let mut scenarios = vec![
        page_integrity(config),
        basic_inline(config),
        inline_direct_word(config),
        structured(config),
        pointer_tag(config),
        multi_page(config),
        double_enable(config),
        never_enabled(config),
        enable_disable_cycle(config),
        disable_clears(config),
        get_before_set(config.model),
        stepwise(config),
        set_without_enable(config.model),
    ];

    if config.model.auto_expand_on_set {
        scenarios.push(set_timing(config));
    }

    scenarios.extend([lifecycle_stress(config), inline_stress(config)]);
    scenarios
}

/// Returns the scenario variants of the contract choices `config.model`
/// does not make.
///
/// A collaborator honouring the configured contract fails every one of them.
pub fn alternatives(config: &HarnessConfig) -> Vec<Scenario> {
    let model = config.model;
    let unset_read = match model.unset_read {
        UnsetRead::NoData => UnsetRead::Zeroed,
        UnsetRead::Zeroed => UnsetRead::NoData,
    };

    let mut scenarios = vec![
        get_before_set(model.with_unset_read(unset_read)),
        set_without_enable(model.with_auto_expand_on_set(!model.auto_expand_on_set)),
    ];

    if !model.auto_expand_on_set {
        scenarios.push(set_timing(config));
    }

    scenarios
}

/// Returns the canonical scenario or alternative with the given name.
pub fn by_name(config: &HarnessConfig, name: &str) -> Option<Scenario> {
    all(config)
        .into_iter()
        .chain(alternatives(config))
        .find(|scenario| scenario.name == name)
}

fn inline(tag: InlineTag, value: u64) -> MetadataValue {
    MetadataValue::inline(tag, value)
}

fn value(value: impl Into<ValueSpec>) -> Expect {
    Expect::Value(value.into())
}

fn fails(kind: ErrorKind) -> Expect {
    Expect::Failure(kind)
}

/// Outcome of reading an unset page of an expanded table.
fn unset_read(model: ModelConfig) -> Expect {
    match model.unset_read {
        UnsetRead::NoData => fails(ErrorKind::NoData),
        UnsetRead::Zeroed => value(inline(InlineTag::Scalar, 0)),
    }
}

/// Allocate, stamp and verify without any ABI call.
fn page_integrity(config: &HarnessConfig) -> Scenario {
    Scenario::new("page-integrity", config.model)
}

fn basic_inline(config: &HarnessConfig) -> Scenario {
    let meta = inline(InlineTag::Pointer, INLINE_VALUE);

    Scenario::new("basic-inline", config.model).steps([
        Step::enable(0).expect(Expect::Success),
        Step::set(0, meta.clone()).expect(Expect::Success),
        Step::get(0, Mdp::Inline).expect(value(meta)),
        Step::disable(0).expect(Expect::Success),
    ])
}

fn inline_direct_word(config: &HarnessConfig) -> Scenario {
    let meta = MetadataValue::word(DIRECT_WORD);

    Scenario::new("inline-direct-word", config.model).steps([
        Step::enable(0),
        Step::set(0, meta.clone()),
        Step::get(0, Mdp::Inline).expect(value(meta)),
        Step::disable(0),
    ])
}

fn structured(config: &HarnessConfig) -> Scenario {
    let meta = MetadataValue::structured(STRUCTURED_VERSION, STRUCTURED_KIND, STRUCTURED_PAYLOAD);

    Scenario::new("structured", config.model).steps([
        Step::enable(0).expect(Expect::Success),
        Step::set(0, meta.clone()).expect(Expect::Success),
        Step::get(0, Mdp::Structured).expect(value(meta)),
        Step::disable(0).expect(Expect::Success),
    ])
}

/// Both tag values round-trip on the same page.
fn pointer_tag(config: &HarnessConfig) -> Scenario {
    let scalar = inline(InlineTag::Scalar, 0x1234_5678);
    let pointer = inline(InlineTag::Pointer, 0x1234_5678);

    Scenario::new("pointer-tag", config.model).steps([
        Step::enable(0),
        Step::set(0, scalar.clone()),
        Step::get(0, Mdp::Inline).expect(value(scalar)),
        Step::set(0, pointer.clone()),
        Step::get(0, Mdp::Inline).expect(value(pointer)),
        Step::disable(0),
    ])
}

/// Pages of one table carry independent metadata. Every page is read back
/// after each `set` to catch writes that leak into neighbours.
fn multi_page(config: &HarnessConfig) -> Scenario {
    let word = |page: usize| MetadataValue::word(0xDEAD_BEEF_0000_0000 | page as u64);

    let mut scenario = Scenario::new("multi-page", config.model)
        .with_pages_in_table(MULTI_PAGE_COUNT)
        .step(Step::enable(0).expect(Expect::Success));

    for page in 0..MULTI_PAGE_COUNT {
        scenario = scenario.steps([
            Step::set(page, word(page)).expect(Expect::Success),
            Step::CheckAllPages,
        ]);
    }

    for page in 0..MULTI_PAGE_COUNT {
        scenario = scenario.step(Step::get(page, Mdp::Inline).expect(value(word(page))));
    }

    scenario.step(Step::disable(0).expect(Expect::Success))
}

fn double_enable(config: &HarnessConfig) -> Scenario {
    Scenario::new("double-enable", config.model).steps([
        Step::enable(0).expect(Expect::Success),
        Step::enable(0).expect(fails(ErrorKind::AlreadyExpanded)),
        Step::AssertLifecycle {
            page: 0,
            state: Lifecycle::Expanded,
        },
        Step::disable(0).expect(Expect::Success),
    ])
}

fn never_enabled(config: &HarnessConfig) -> Scenario {
    Scenario::new("never-enabled", config.model).steps([
        Step::get(0, Mdp::Inline).expect(fails(ErrorKind::NoData)),
        Step::disable(0).expect(fails(ErrorKind::NotExpanded)),
        Step::AssertLifecycle {
            page: 0,
            state: Lifecycle::Unexpanded,
        },
    ])
}

fn enable_disable_cycle(config: &HarnessConfig) -> Scenario {
    Scenario::new("enable-disable-cycle", config.model).step(Step::repeat(
        2,
        [
            Step::enable(0).expect(Expect::Success),
            Step::disable(0).expect(Expect::Success),
        ],
    ))
}

/// Metadata does not survive a disable/enable cycle.
fn disable_clears(config: &HarnessConfig) -> Scenario {
    let meta = inline(InlineTag::Scalar, 0x42);

    Scenario::new("disable-clears", config.model).steps([
        Step::enable(0),
        Step::set(0, meta.clone()),
        Step::get(0, Mdp::Inline).expect(value(meta)),
        Step::disable(0),
        Step::enable(0),
        Step::get(0, Mdp::Inline),
        Step::disable(0),
    ])
}

fn get_before_set(model: ModelConfig) -> Scenario {
    let name = match model.unset_read {
        UnsetRead::NoData => "get-before-set",
        UnsetRead::Zeroed => "get-before-set-zeroed",
    };

    Scenario::new(name, model).steps([
        Step::enable(0),
        Step::get(0, Mdp::Inline).expect(unset_read(model)),
        Step::disable(0),
    ])
}

/// Enable, read the unset page, disable, then set and read back. Without
/// auto-expansion the table is enabled again before the `set`.
fn stepwise(config: &HarnessConfig) -> Scenario {
    let model = config.model;
    let meta = inline(InlineTag::Pointer, INLINE_VALUE);

    let mut scenario = Scenario::new("stepwise", model).steps([
        Step::enable(0).expect(Expect::Success),
        Step::get(0, Mdp::Inline).expect(unset_read(model)),
        Step::disable(0).expect(Expect::Success),
    ]);

    if !model.auto_expand_on_set {
        scenario = scenario.step(Step::enable(0).expect(Expect::Success));
    }

    scenario.steps([
        Step::set(0, meta.clone()).expect(Expect::Success),
        Step::get(0, Mdp::Inline).expect(value(meta)),
        Step::disable(0).expect(Expect::Success),
    ])
}

fn set_without_enable(model: ModelConfig) -> Scenario {
    let meta = inline(InlineTag::Pointer, INLINE_VALUE);

    if !model.auto_expand_on_set {
        return Scenario::new("set-without-enable-rejected", model).steps([
            Step::set(0, meta).expect(fails(ErrorKind::NotExpanded)),
            Step::AssertLifecycle {
                page: 0,
                state: Lifecycle::Unexpanded,
            },
            Step::get(0, Mdp::Inline).expect(fails(ErrorKind::NoData)),
        ]);
    }

    Scenario::new("set-without-enable", model).steps([
        Step::set(0, meta.clone()).expect(Expect::Success),
        Step::AssertLifecycle {
            page: 0,
            state: Lifecycle::Expanded,
        },
        Step::get(0, Mdp::Inline).expect(value(meta)),
        Step::disable(0).expect(Expect::Success),
    ])
}

/// The first `set` on a fresh table pays for the expansion.
fn set_timing(config: &HarnessConfig) -> Scenario {
    let model = config.model.with_auto_expand_on_set(true);
    let second = inline(InlineTag::Pointer, 0xDEAD_BEEF);

    Scenario::new("set-timing", model)
        .steps([
            Step::set(0, inline(InlineTag::Pointer, INLINE_VALUE)).expect(Expect::Success),
            Step::set(0, second.clone()).expect(Expect::Success),
            Step::get(0, Mdp::Inline).expect(value(second)),
            Step::disable(0).expect(Expect::Success),
        ])
        .assert(Assertion::ExpansionCostVisible {
            operation: Operation::Set(Mdp::Inline),
        })
}

fn lifecycle_stress(config: &HarnessConfig) -> Scenario {
    let meta = inline(InlineTag::Pointer, INLINE_VALUE);

    let mut scenario = Scenario::new("lifecycle-stress", config.model).step(Step::repeat(
        config.stress_iterations,
        [
            Step::enable(0).expect(Expect::Success),
            Step::set(0, meta.clone()).expect(Expect::Success),
            Step::get(0, Mdp::Inline).expect(value(meta)),
            Step::disable(0).expect(Expect::Success),
        ],
    ));

    for operation in [
        Operation::Enable,
        Operation::Set(Mdp::Inline),
        Operation::Get(Mdp::Inline),
        Operation::Disable,
    ] {
        scenario = scenario.assert(Assertion::StatsAvailable { operation });
    }

    scenario
}

/// Strictly increasing inline values, each read back right after it was
/// written. With auto-expansion the first `set` expands the table and has to
/// show the cost of it.
fn inline_stress(config: &HarnessConfig) -> Scenario {
    let model = config.model;
    let sequence = ValueSpec::InlineSequence {
        tag: InlineTag::Scalar,
        start: 1,
    };

    let mut scenario = Scenario::new("inline-stress", model);
    if !model.auto_expand_on_set {
        scenario = scenario.step(Step::enable(0).expect(Expect::Success));
    }

    scenario = scenario.steps([
        Step::repeat(
            config.stress_iterations.max(2),
            [
                Step::set(0, sequence.clone()).expect(Expect::Success),
                Step::get(0, Mdp::Inline).expect(value(sequence)),
            ],
        ),
        Step::disable(0).expect(Expect::Success),
    ]);

    if model.auto_expand_on_set {
        scenario = scenario.assert(Assertion::ExpansionCostVisible {
            operation: Operation::Set(Mdp::Inline),
        });
    }

    scenario
        .assert(Assertion::StatsAvailable {
            operation: Operation::Set(Mdp::Inline),
        })
        .assert(Assertion::StatsAvailable {
            operation: Operation::Get(Mdp::Inline),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contracts() -> impl Iterator<Item = HarnessConfig> {
        [true, false].into_iter().flat_map(|auto_expand_on_set| {
            [UnsetRead::NoData, UnsetRead::Zeroed].map(|unset_read| {
                HarnessConfig::default().with_model(
                    ModelConfig::default()
                        .with_auto_expand_on_set(auto_expand_on_set)
                        .with_unset_read(unset_read),
                )
            })
        })
    }

    #[test]
    fn names_are_unique() {
        for config in contracts() {
            let scenarios = all(&config)
                .into_iter()
                .chain(alternatives(&config))
                .collect::<Vec<_>>();
            let mut names = scenarios
                .iter()
                .map(|scenario| scenario.name.as_str())
                .collect::<Vec<_>>();

            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), scenarios.len());
            assert_eq!(scenarios.len(), 18);
        }
    }

    #[test]
    fn catalog_follows_configured_contract() {
        for config in contracts() {
            for scenario in all(&config) {
                assert_eq!(scenario.model, config.model, "{}", scenario.name);
            }

            for scenario in alternatives(&config) {
                assert_ne!(scenario.model, config.model, "{}", scenario.name);
            }
        }
    }

    #[test]
    fn set_timing_needs_auto_expansion() {
        let names = |config: &HarnessConfig| {
            all(config)
                .into_iter()
                .map(|scenario| scenario.name)
                .collect::<Vec<_>>()
        };

        let auto = HarnessConfig::default();
        assert_eq!(all(&auto).len(), 16);
        assert!(names(&auto).iter().any(|name| name == "set-timing"));

        let strict = HarnessConfig::default()
            .with_model(ModelConfig::default().with_auto_expand_on_set(false));
        assert_eq!(all(&strict).len(), 15);
        assert!(!names(&strict).iter().any(|name| name == "set-timing"));
        assert!(names(&strict).iter().any(|name| name == "set-without-enable-rejected"));
        assert!(by_name(&strict, "set-timing").is_some());
    }

    #[test]
    fn lookup_by_name() {
        let config = HarnessConfig::default().with_stress_iterations(3);

        let scenario = by_name(&config, "lifecycle-stress").expect("scenario");
        assert_eq!(
            scenario.steps[0],
            Step::repeat(
                3,
                [
                    Step::enable(0).expect(Expect::Success),
                    Step::set(0, inline(InlineTag::Pointer, INLINE_VALUE))
                        .expect(Expect::Success),
                    Step::get(0, Mdp::Inline)
                        .expect(value(inline(InlineTag::Pointer, INLINE_VALUE))),
                    Step::disable(0).expect(Expect::Success),
                ]
            )
        );

        assert!(by_name(&config, "no-such-scenario").is_none());
    }

    #[test]
    fn contract_pairs_differ() {
        let config = HarnessConfig::default();

        let no_data = by_name(&config, "get-before-set").expect("scenario");
        let zeroed = by_name(&config, "get-before-set-zeroed").expect("scenario");
        assert_eq!(no_data.model.unset_read, UnsetRead::NoData);
        assert_eq!(zeroed.model.unset_read, UnsetRead::Zeroed);

        let auto = by_name(&config, "set-without-enable").expect("scenario");
        let strict = by_name(&config, "set-without-enable-rejected").expect("scenario");
        assert!(auto.model.auto_expand_on_set);
        assert!(!strict.model.auto_expand_on_set);
    }

    #[test]
    fn multi_page_is_one_table() {
        let scenario = by_name(&HarnessConfig::default(), "multi-page").expect("scenario");
        assert_eq!(scenario.pages, MULTI_PAGE_COUNT);
        assert!(scenario.one_table);
        assert_eq!(
            scenario
                .steps
                .iter()
                .filter(|step| **step == Step::CheckAllPages)
                .count(),
            MULTI_PAGE_COUNT
        );
    }
}
