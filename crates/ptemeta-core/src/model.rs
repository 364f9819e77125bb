//! Expected-state model of per-page-table metadata.
//!
//! The model tracks what the harness believes the collaborator holds: the
//! lifecycle of every page table it touched and the last value written to
//! every page. Before each call it predicts the outcome; after the call it
//! checks the observed outcome against that prediction and applies the
//! transition.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    ErrorKind, InlineTag, Mdp, MetadataValue, Operation, OutcomeClass, PageGeometry, PageIndex,
    PteMetaError, StateViolation, TableId, Va, codec::verify_round_trip,
};

/// Lifecycle of a page table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// The table cannot hold metadata.
    #[default]
    Unexpanded,

    /// The table holds per-page metadata.
    Expanded,
}

/// Result of reading a page that was never set on an expanded table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnsetRead {
    /// The read fails with [`ErrorKind::NoData`].
    #[default]
    NoData,

    /// An inline read returns a zero word. Structured reads still fail with
    /// [`ErrorKind::NoData`].
    Zeroed,
}

/// Contract choices the model cannot infer from the ABI alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Whether `set` on an unexpanded table expands it implicitly.
    pub auto_expand_on_set: bool,

    /// Outcome of reading an unset page.
    pub unset_read: UnsetRead,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            auto_expand_on_set: true,
            unset_read: UnsetRead::NoData,
        }
    }
}

impl ModelConfig {
    /// Sets whether `set` on an unexpanded table expands it.
    pub fn with_auto_expand_on_set(self, auto_expand_on_set: bool) -> Self {
        Self {
            auto_expand_on_set,
            ..self
        }
    }

    /// Sets the outcome of reading an unset page.
    pub fn with_unset_read(self, unset_read: UnsetRead) -> Self {
        Self { unset_read, ..self }
    }
}

/// A call as seen by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `enable(va)`.
    Enable(Va),

    /// `disable(va)`.
    Disable(Va),

    /// `set(va, value)`.
    Set(Va, MetadataValue),

    /// `get(va, mdp)`.
    Get(Va, Mdp),
}

impl Call {
    /// Returns the address the call targets.
    pub fn va(&self) -> Va {
        match self {
            Self::Enable(va) | Self::Disable(va) | Self::Set(va, _) | Self::Get(va, _) => *va,
        }
    }

    /// Returns the ABI operation of the call.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Enable(_) => Operation::Enable,
            Self::Disable(_) => Operation::Disable,
            Self::Set(_, value) => Operation::Set(value.mdp()),
            Self::Get(_, mdp) => Operation::Get(*mdp),
        }
    }
}

/// Outcome the model expects for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// The call succeeds. A `get` carries the value it must return.
    Success(Option<MetadataValue>),

    /// The call fails.
    Failure(ErrorKind),
}

impl Prediction {
    /// Returns the outcome class without the value.
    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::Success(_) => OutcomeClass::Success,
            Self::Failure(kind) => OutcomeClass::Failure(*kind),
        }
    }
}

/// Bookkeeping for one page table.
#[derive(Debug, Default, Clone)]
pub struct PageTableState {
    /// Lifecycle of the table.
    pub lifecycle: Lifecycle,

    /// First address through which the table was touched.
    pub anchor: Va,

    /// Last value written to each page.
    pub pages: BTreeMap<PageIndex, MetadataValue>,
}

/// Expected-state model of every page table touched by a scenario.
#[derive(Debug, Clone)]
pub struct PageTableModel {
    geometry: PageGeometry,
    config: ModelConfig,
    tables: IndexMap<TableId, PageTableState>,
}

impl PageTableModel {
    /// Creates an empty model.
    pub fn new(geometry: PageGeometry, config: ModelConfig) -> Self {
        Self {
            geometry,
            config,
            tables: IndexMap::new(),
        }
    }

    /// Returns the page geometry.
    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// Returns the contract configuration.
    pub fn config(&self) -> ModelConfig {
        self.config
    }

    /// Returns the believed lifecycle of the table mapping `va`.
    pub fn lifecycle(&self, va: Va) -> Lifecycle {
        self.table(va)
            .map(|state| state.lifecycle)
            .unwrap_or_default()
    }

    /// Returns the last value written to the page containing `va`.
    pub fn value(&self, va: Va) -> Option<&MetadataValue> {
        let index = self.geometry.page_index(va);
        self.table(va)?.pages.get(&index)
    }

    /// Returns every table believed to be expanded with its anchor address.
    pub fn expanded_tables(&self) -> SmallVec<[(TableId, Va); 4]> {
        self.tables
            .iter()
            .filter(|(_, state)| state.lifecycle == Lifecycle::Expanded)
            .map(|(table, state)| (*table, state.anchor))
            .collect()
    }

    /// Forgets every table.
    pub fn reset(&mut self) {
        self.tables.clear();
    }

    /// Predicts the outcome of `call`.
    pub fn predict(&self, call: &Call) -> Prediction {
        let va = call.va();
        let lifecycle = self.lifecycle(va);

        match (call, lifecycle) {
            (Call::Enable(_), Lifecycle::Unexpanded) => Prediction::Success(None),
            (Call::Enable(_), Lifecycle::Expanded) => {
                Prediction::Failure(ErrorKind::AlreadyExpanded)
            }

            (Call::Disable(_), Lifecycle::Expanded) => Prediction::Success(None),
            (Call::Disable(_), Lifecycle::Unexpanded) => {
                Prediction::Failure(ErrorKind::NotExpanded)
            }

            (Call::Set(..), Lifecycle::Expanded) => Prediction::Success(None),
            (Call::Set(..), Lifecycle::Unexpanded) => {
                if self.config.auto_expand_on_set {
                    Prediction::Success(None)
                }
                else {
                    Prediction::Failure(ErrorKind::NotExpanded)
                }
            }

            (Call::Get(..), Lifecycle::Unexpanded) => Prediction::Failure(ErrorKind::NoData),
            (Call::Get(_, mdp), Lifecycle::Expanded) => match self.value(va) {
                Some(value) if value.mdp() == *mdp => Prediction::Success(Some(value.clone())),
                Some(_) => Prediction::Failure(ErrorKind::InvalidArgument),
                None => match (self.config.unset_read, mdp) {
                    (UnsetRead::Zeroed, Mdp::Inline) => {
                        Prediction::Success(Some(MetadataValue::inline(InlineTag::Scalar, 0)))
                    }
                    _ => Prediction::Failure(ErrorKind::NoData),
                },
            },
        }
    }

    /// Checks an observed outcome against the prediction and applies the
    /// transition.
    ///
    /// `retrieved` is the value returned by a successful `get`. A different
    /// outcome class is a [`StateViolation`]; a different value is a
    /// round-trip [`CodecError`](crate::CodecError).
    pub fn observe(
        &mut self,
        call: &Call,
        observed: OutcomeClass,
        retrieved: Option<&MetadataValue>,
    ) -> Result<(), PteMetaError> {
        let va = call.va();
        let prediction = self.predict(call);

        if prediction.class() != observed {
            return Err(StateViolation {
                table: self.geometry.table_of(va),
                page: self.geometry.page_index(va),
                operation: call.operation(),
                state: self.lifecycle(va),
                expected: prediction.class(),
                observed,
            }
            .into());
        }

        if let (Prediction::Success(Some(expected)), Some(retrieved)) = (&prediction, retrieved) {
            verify_round_trip(expected, retrieved)?;
        }

        if observed == OutcomeClass::Success {
            self.apply(call);
        }

        Ok(())
    }

    fn apply(&mut self, call: &Call) {
        let va = call.va();
        let table = self.geometry.table_of(va);
        let index = self.geometry.page_index(va);

        let state = self.tables.entry(table).or_insert_with(|| PageTableState {
            anchor: va,
            ..Default::default()
        });

        match call {
            Call::Enable(_) => {
                tracing::debug!(%table, %va, "table expanded");
                state.lifecycle = Lifecycle::Expanded;
            }
            Call::Disable(_) => {
                tracing::debug!(%table, %va, pages = state.pages.len(), "table torn down");
                state.lifecycle = Lifecycle::Unexpanded;
                state.pages.clear();
            }
            Call::Set(_, value) => {
                if state.lifecycle == Lifecycle::Unexpanded {
                    tracing::debug!(%table, %va, "table expanded by set");
                    state.lifecycle = Lifecycle::Expanded;
                }

                state.pages.insert(index, value.clone());
            }
            Call::Get(..) => {}
        }
    }

    fn table(&self, va: Va) -> Option<&PageTableState> {
        self.tables.get(&self.geometry.table_of(va))
    }
}
