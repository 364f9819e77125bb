//! Declarative scenario descriptions.
//!
//! A [`Scenario`] is plain data: the memory it needs, the contract it
//! assumes and the [`Step`]s to perform. The
//! [`ScenarioRunner`](crate::ScenarioRunner) interprets it.

pub mod catalog;
mod runner;

use ptemeta_core::{
    ErrorKind, InlineTag, Lifecycle, Mdp, MetadataValue, ModelConfig, Operation, PteMetaError,
};
use serde::{Deserialize, Serialize};

pub use self::runner::ScenarioRunner;

/// A named, scripted exercise of the metadata ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name.
    pub name: String,

    /// Number of pages to allocate.
    pub pages: usize,

    /// Whether all pages must be mapped by a single page table.
    pub one_table: bool,

    /// Contract choices the model runs with.
    pub model: ModelConfig,

    /// Steps performed during the operate phase.
    pub steps: Vec<Step>,

    /// Checks performed during the verify phase.
    pub assertions: Vec<Assertion>,
}

impl Scenario {
    /// Creates a scenario over a single page with no steps.
    pub fn new(name: impl Into<String>, model: ModelConfig) -> Self {
        Self {
            name: name.into(),
            pages: 1,
            one_table: false,
            model,
            steps: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Sets the number of pages, all mapped by one page table.
    pub fn with_pages_in_table(self, pages: usize) -> Self {
        Self {
            pages,
            one_table: true,
            ..self
        }
    }

    /// Appends a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Appends an assertion.
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }
}

/// A single step of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Performs one ABI call and checks its outcome.
    Call {
        /// The call.
        call: StepCall,

        /// Outcome the step requires.
        expect: Expect,
    },

    /// Performs the nested steps `iterations` times.
    ///
    /// The iteration index feeds [`ValueSpec::InlineSequence`].
    Repeat {
        /// Number of iterations.
        iterations: u32,

        /// Steps of one iteration.
        steps: Vec<Step>,
    },

    /// Reads back every page of the region and checks it against the model.
    CheckAllPages,

    /// Checks the lifecycle the model holds for the table of a page.
    AssertLifecycle {
        /// Page index within the region.
        page: usize,

        /// Required lifecycle.
        state: Lifecycle,
    },
}

impl Step {
    /// `enable` on a page, checked against the model.
    pub fn enable(page: usize) -> Self {
        Self::call(StepCall::Enable(page))
    }

    /// `disable` on a page, checked against the model.
    pub fn disable(page: usize) -> Self {
        Self::call(StepCall::Disable(page))
    }

    /// `set` on a page, checked against the model.
    pub fn set(page: usize, value: impl Into<ValueSpec>) -> Self {
        Self::call(StepCall::Set(page, value.into()))
    }

    /// `get` on a page, checked against the model.
    pub fn get(page: usize, mdp: Mdp) -> Self {
        Self::call(StepCall::Get(page, mdp))
    }

    /// Repeats `steps`.
    pub fn repeat(iterations: u32, steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Repeat {
            iterations,
            steps: steps.into_iter().collect(),
        }
    }

    /// Replaces the expectation of a call step. Other steps are returned
    /// unchanged.
    pub fn expect(self, expect: Expect) -> Self {
        match self {
            Self::Call { call, .. } => Self::Call { call, expect },
            other => other,
        }
    }

    fn call(call: StepCall) -> Self {
        Self::Call {
            call,
            expect: Expect::Model,
        }
    }
}

/// An ABI call addressed by page index within the scenario's region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepCall {
    /// `enable` on the table mapping the page.
    Enable(usize),

    /// `disable` on the table mapping the page.
    Disable(usize),

    /// `set` on the page.
    Set(usize, ValueSpec),

    /// `get` on the page.
    Get(usize, Mdp),
}

impl StepCall {
    /// Returns the page index the call targets.
    pub fn page(&self) -> usize {
        match self {
            Self::Enable(page) | Self::Disable(page) | Self::Set(page, _) | Self::Get(page, _) => {
                *page
            }
        }
    }
}

/// Outcome a call step requires.
///
/// Every outcome is also checked against the model, so `Model` only relies
/// on the model's prediction while the other variants pin the outcome down
/// in the scenario itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expect {
    /// Whatever the model predicts.
    Model,

    /// Success.
    Success,

    /// A successful `get` returning this value.
    Value(ValueSpec),

    /// Failure of this kind.
    Failure(ErrorKind),
}

/// Metadata to write or to expect, possibly depending on the iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSpec {
    /// A fixed value.
    Fixed(MetadataValue),

    /// Inline metadata whose value is `start` plus the iteration index.
    InlineSequence {
        /// The type tag.
        tag: InlineTag,

        /// Value in the first iteration.
        start: u64,
    },
}

impl ValueSpec {
    /// Resolves the value for the given iteration.
    pub fn resolve(&self, iteration: u32) -> MetadataValue {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::InlineSequence { tag, start } => {
                MetadataValue::inline(*tag, start.wrapping_add(u64::from(iteration)))
            }
        }
    }
}

impl From<MetadataValue> for ValueSpec {
    fn from(value: MetadataValue) -> Self {
        Self::Fixed(value)
    }
}

/// A check performed on the statistics after the operate phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assertion {
    /// The first sample of `operation` is slower than the mean of the
    /// remaining ones. Requires at least two samples.
    ExpansionCostVisible {
        /// The operation.
        operation: Operation,
    },

    /// At least one sample of `operation` was recorded.
    StatsAvailable {
        /// The operation.
        operation: Operation,
    },
}

impl Assertion {
    /// Returns a short name for reports.
    pub fn name(&self) -> String {
        match self {
            Self::ExpansionCostVisible { operation } => {
                format!("expansion cost visible in {operation}")
            }
            Self::StatsAvailable { operation } => format!("statistics available for {operation}"),
        }
    }
}

fn assertion_failed(assertion: &Assertion, detail: String) -> PteMetaError {
    PteMetaError::AssertionFailed {
        assertion: assertion.name(),
        detail,
    }
}
