//! Scenario runner for per-PTE metadata collaborators.
//!
//! A [`Scenario`] describes what to allocate and which calls to make; the
//! [`ScenarioRunner`] performs it against any
//! [`PteMetaDriver`](ptemeta_core::PteMetaDriver) and produces a
//! [`ScenarioReport`]. [`catalog::all`] lists the canonical scenarios.
//!
//! ```no_run
//! # use ptemeta_core::PteMetaDriver;
//! # use ptemeta_harness::{HarnessConfig, ScenarioRunner};
//! # fn run(driver: impl PteMetaDriver) -> Result<(), ptemeta_core::PteMetaError> {
//! let runner = ScenarioRunner::new(driver, HarnessConfig::default())?;
//!
//! for report in runner.run_catalog() {
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod report;
mod scenario;

pub use self::{
    config::HarnessConfig,
    report::{ScenarioReport, Verdict},
    scenario::{
        Assertion, Expect, Scenario, ScenarioRunner, Step, StepCall, ValueSpec, catalog,
    },
};
