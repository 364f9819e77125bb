use std::time::{Duration, Instant};

use ptemeta_core::{
    Call, Mdp, MemoryRegion, MetaClient, MetadataValue, OutcomeClass, PageArena,
    PageTableModel, PatternOracle, PteMetaDriver, PteMetaError, StatsCollector, TableId, Va,
    codec::verify_round_trip,
};
use smallvec::SmallVec;

use super::{Assertion, Expect, Scenario, Step, StepCall, assertion_failed, catalog};
use crate::{HarnessConfig, ScenarioReport, Verdict};

/// Runs [`Scenario`]s against a metadata collaborator.
///
/// Every scenario goes through four phases:
///
/// 1. Setup: acquire the region, stamp and verify the pattern.
/// 2. Operate: perform the steps. Each call is preceded and followed by a
///    pattern check, and its outcome is checked against the step and
///    against the [`PageTableModel`].
/// 3. Verify: re-check the pattern and evaluate the assertions.
/// 4. Teardown: disable every table left expanded, re-check the pattern and
///    release the region.
///
/// The first failure ends the scenario. Teardown runs on every path that
/// got past setup.
pub struct ScenarioRunner<Driver>
where
    Driver: PteMetaDriver,
{
    client: MetaClient<Driver>,
    arena: PageArena,
    oracle: PatternOracle,
    config: HarnessConfig,
}

/// State of one scenario between setup and teardown.
struct Execution<'a> {
    scenario: &'a Scenario,
    region: MemoryRegion,
    model: PageTableModel,
    stage: String,
}

impl<Driver> ScenarioRunner<Driver>
where
    Driver: PteMetaDriver,
{
    /// Creates a new runner.
    pub fn new(driver: Driver, config: HarnessConfig) -> Result<Self, PteMetaError> {
        let geometry = config.geometry()?;

        let client = MetaClient::new(driver)
            .with_classifier(config.classifier.clone())
            .with_header_layout(config.header_layout);

        Ok(Self {
            client,
            arena: PageArena::new(geometry).with_pinning(config.pin_memory),
            oracle: PatternOracle::new(config.pattern),
            config,
        })
    }

    /// Returns the client.
    pub fn client(&self) -> &MetaClient<Driver> {
        &self.client
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs every scenario of the canonical catalog.
    pub fn run_catalog(&self) -> Vec<ScenarioReport> {
        self.run_all(&catalog::all(&self.config))
    }

    /// Runs scenarios one after another.
    pub fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioReport> {
        scenarios
            .iter()
            .map(|scenario| self.run(scenario))
            .collect()
    }

    /// Runs a single scenario.
    pub fn run(&self, scenario: &Scenario) -> ScenarioReport {
        tracing::info!(scenario = %scenario.name, pages = scenario.pages, "scenario started");

        let start = Instant::now();
        self.client.take_stats();

        let (verdict, stats) = match self.setup(scenario) {
            Ok(mut execution) => {
                let result = self
                    .operate(&mut execution)
                    .and_then(|()| self.verify(&mut execution));

                let stats = self.client.take_stats();
                let stage = std::mem::take(&mut execution.stage);
                let teardown = self.teardown(execution, result.is_err());

                let verdict = match (result, teardown) {
                    (Err(error), _) => Verdict::Failed { stage, error },
                    (Ok(()), Err(error)) => Verdict::Failed {
                        stage: String::from("teardown"),
                        error,
                    },
                    (Ok(()), Ok(())) => Verdict::Passed,
                };

                (verdict, stats)
            }
            Err(error) => {
                let verdict = Verdict::Failed {
                    stage: String::from("setup"),
                    error,
                };

                (verdict, self.client.take_stats())
            }
        };

        // Teardown calls are not part of the measurement.
        self.client.take_stats();

        let elapsed = start.elapsed();
        match &verdict {
            Verdict::Passed => {
                tracing::info!(scenario = %scenario.name, ?elapsed, "scenario passed");
            }
            Verdict::Failed { stage, error } => {
                tracing::error!(scenario = %scenario.name, %stage, %error, "scenario failed");
            }
        }

        ScenarioReport {
            name: scenario.name.clone(),
            verdict,
            stats,
            elapsed,
        }
    }

    fn setup<'a>(&self, scenario: &'a Scenario) -> Result<Execution<'a>, PteMetaError> {
        let start = Instant::now();
        let mut region = if scenario.one_table {
            self.arena.acquire_in_table(scenario.pages)?
        }
        else {
            self.arena.acquire(scenario.pages)?
        };
        self.client.record("page_allocation", start.elapsed());

        let start = Instant::now();
        self.oracle.stamp(&mut region);
        self.client.record("pattern_stamp", start.elapsed());

        self.oracle.verify(&region, "after stamping")?;

        tracing::debug!(
            base = %region.base(),
            pages = region.page_count(),
            pinned = region.is_pinned(),
            "region ready"
        );

        Ok(Execution {
            scenario,
            region,
            model: PageTableModel::new(self.arena.geometry(), scenario.model),
            stage: String::from("operate"),
        })
    }

    fn operate(&self, execution: &mut Execution) -> Result<(), PteMetaError> {
        let scenario = execution.scenario;
        self.execute(execution, &scenario.steps, None, 0)
    }

    fn execute(
        &self,
        execution: &mut Execution,
        steps: &[Step],
        parent: Option<&str>,
        iteration: u32,
    ) -> Result<(), PteMetaError> {
        for (index, step) in steps.iter().enumerate() {
            let position = match parent {
                Some(parent) => format!("{parent}.{}", index + 1),
                None => format!("step {}", index + 1),
            };

            match step {
                Step::Call { call, expect } => {
                    self.call(execution, call, expect, &position, iteration)?;
                }
                Step::Repeat { iterations, steps } => {
                    for iteration in 0..*iterations {
                        let parent = format!("{position}[{iteration}]");
                        self.execute(execution, steps, Some(&parent), iteration)?;
                    }
                }
                Step::CheckAllPages => {
                    for page in 0..execution.region.page_count() {
                        let va = page_va(&execution.region, page)?;
                        let mdp = execution
                            .model
                            .value(va)
                            .map_or(Mdp::Inline, MetadataValue::mdp);

                        self.call(
                            execution,
                            &StepCall::Get(page, mdp),
                            &Expect::Model,
                            &format!("{position} (page {page})"),
                            iteration,
                        )?;
                    }
                }
                Step::AssertLifecycle { page, state } => {
                    execution.stage = format!("{position}: lifecycle of page {page}");

                    let va = page_va(&execution.region, *page)?;
                    let observed = execution.model.lifecycle(va);
                    if observed != *state {
                        return Err(PteMetaError::AssertionFailed {
                            assertion: format!("table of page {page} is {state:?}"),
                            detail: format!("model holds {observed:?}"),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn call(
        &self,
        execution: &mut Execution,
        step: &StepCall,
        expect: &Expect,
        position: &str,
        iteration: u32,
    ) -> Result<(), PteMetaError> {
        let va = page_va(&execution.region, step.page())?;
        let call = match step {
            StepCall::Enable(_) => Call::Enable(va),
            StepCall::Disable(_) => Call::Disable(va),
            StepCall::Set(_, value) => Call::Set(va, value.resolve(iteration)),
            StepCall::Get(_, mdp) => Call::Get(va, *mdp),
        };

        execution.stage = format!("{position}: {} page {}", call.operation(), step.page());
        self.oracle
            .verify(&execution.region, &format!("before {}", execution.stage))?;

        let answer = match &call {
            Call::Enable(va) => Ok((OutcomeClass::from(&self.client.enable(*va)), None)),
            Call::Disable(va) => Ok((OutcomeClass::from(&self.client.disable(*va)), None)),
            Call::Set(va, value) => self
                .client
                .set(*va, value)
                .map(|outcome| (OutcomeClass::from(&outcome), None)),
            Call::Get(va, mdp) => {
                let payload_len = match expect {
                    Expect::Value(spec) => spec.resolve(iteration).payload_len(),
                    _ => execution
                        .model
                        .value(*va)
                        .map_or(0, MetadataValue::payload_len),
                };

                self.client
                    .get(*va, *mdp, payload_len)
                    .map(|outcome| (OutcomeClass::from(&outcome), outcome.ok()))
            }
        };

        // The pattern is checked even when the answer could not be decoded.
        self.oracle
            .verify(&execution.region, &format!("after {}", execution.stage))?;
        let (observed, retrieved) = answer?;

        check_expectation(expect, &call, observed, retrieved.as_ref(), iteration)?;
        execution.model.observe(&call, observed, retrieved.as_ref())
    }

    fn verify(&self, execution: &mut Execution) -> Result<(), PteMetaError> {
        execution.stage = String::from("verify");
        self.oracle.verify(&execution.region, "at verify")?;

        let stats = self.client.stats();
        for assertion in &execution.scenario.assertions {
            execution.stage = format!("verify: {}", assertion.name());
            check_assertion(assertion, &stats)?;
        }

        Ok(())
    }

    fn teardown(&self, mut execution: Execution, failed: bool) -> Result<(), PteMetaError> {
        let expanded = execution.model.expanded_tables();

        for (table, anchor) in &expanded {
            if let Err(kind) = self.client.disable(*anchor) {
                tracing::warn!(%table, %anchor, %kind, "failed to disable table during teardown");
            }
        }

        // After a failure the collaborator may hold tables the model never
        // saw expanded.
        if failed {
            let geometry = self.arena.geometry();
            let mut swept: SmallVec<[TableId; 4]> =
                expanded.iter().map(|(table, _)| *table).collect();

            for va in execution.region.pages() {
                let table = geometry.table_of(va);
                if swept.contains(&table) {
                    continue;
                }

                swept.push(table);
                if self.client.disable(va).is_ok() {
                    tracing::warn!(%table, "disabled a table the model did not track");
                }
            }
        }

        let integrity = self.oracle.verify(&execution.region, "after teardown");

        execution.model.reset();
        let released = self.arena.release(execution.region);

        match integrity {
            Err(error) if failed => {
                tracing::warn!(%error, "pattern check failed during teardown");
                released
            }
            Err(error) => Err(error),
            Ok(()) => released,
        }
    }
}

fn page_va(region: &MemoryRegion, page: usize) -> Result<Va, PteMetaError> {
    region
        .page(page)
        .ok_or(PteMetaError::Other("step addresses a page outside the region"))
}

fn check_expectation(
    expect: &Expect,
    call: &Call,
    observed: OutcomeClass,
    retrieved: Option<&MetadataValue>,
    iteration: u32,
) -> Result<(), PteMetaError> {
    let expected = match expect {
        Expect::Model => return Ok(()),
        Expect::Success | Expect::Value(_) => OutcomeClass::Success,
        Expect::Failure(kind) => OutcomeClass::Failure(*kind),
    };

    if observed != expected {
        return Err(PteMetaError::Abi {
            operation: call.operation(),
            va: call.va(),
            expected,
            observed,
        });
    }

    if let (Expect::Value(spec), Some(retrieved)) = (expect, retrieved) {
        verify_round_trip(&spec.resolve(iteration), retrieved)?;
    }

    Ok(())
}

fn check_assertion(assertion: &Assertion, stats: &StatsCollector) -> Result<(), PteMetaError> {
    match assertion {
        Assertion::ExpansionCostVisible { operation } => {
            let samples = stats.samples(operation.name());
            let (first, rest) = match samples.split_first() {
                Some((first, rest)) if !rest.is_empty() => (first, rest),
                _ => {
                    return Err(assertion_failed(
                        assertion,
                        format!("{} sample(s) recorded, 2 required", samples.len()),
                    ));
                }
            };

            let mean = rest.iter().sum::<Duration>() / rest.len() as u32;
            if *first <= mean {
                return Err(assertion_failed(
                    assertion,
                    format!(
                        "first sample {first:?} is not above the mean {mean:?} of the other {}",
                        rest.len()
                    ),
                ));
            }

            tracing::debug!(%operation, ?first, ?mean, "expansion cost visible");
        }
        Assertion::StatsAvailable { operation } => match stats.summarize(operation.name()) {
            Some(summary) => tracing::info!(%operation, %summary, "statistics"),
            None => {
                return Err(assertion_failed(
                    assertion,
                    String::from("no samples recorded"),
                ));
            }
        },
    }

    Ok(())
}
