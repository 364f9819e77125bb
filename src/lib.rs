//! Conformance and performance harness for per-PTE metadata.
//!
//! Kernel extensions that attach metadata to individual page-table entries
//! expose four operations: expand a page table (`enable`), tear it down
//! (`disable`), attach metadata to a page (`set`) and read it back (`get`).
//! This crate drives those operations against a real kernel or a simulated
//! collaborator, checks that ordinary page contents are never touched, that
//! outcomes follow the page-table lifecycle, and that metadata round-trips
//! unchanged, and collects per-operation timings.
//!
//! The crate is split into several parts:
//!
//! - [`ptemeta_core`]: codec, client, lifecycle model, memory arena,
//!   pattern oracle and statistics. Re-exported at the crate root.
//! - [`driver::linux`]: raw syscall binding (`driver-linux` feature).
//! - [`driver::sim`]: in-memory collaborator (`driver-sim` feature).
//! - [`harness`]: declarative scenarios and their runner (`harness`
//!   feature).
//!
//! # Example
//!
//! ```no_run
//! use ptemeta::{
//!     driver::linux::{LinuxConfig, LinuxDriver},
//!     harness::{HarnessConfig, ScenarioRunner},
//! };
//!
//! # fn main() -> Result<(), ptemeta::PteMetaError> {
//! let driver = LinuxDriver::new(LinuxConfig::default())?;
//! let runner = ScenarioRunner::new(driver, HarnessConfig::default())?;
//!
//! let reports = runner.run_catalog();
//! let failed = reports.iter().filter(|report| !report.is_passed()).count();
//! println!("{failed} scenario(s) failed");
//! # Ok(())
//! # }
//! ```

pub use ptemeta_core::*;

/// Metadata drivers.
pub mod driver {
    /// Linux syscall driver.
    #[cfg(feature = "driver-linux")]
    pub mod linux {
        pub use ptemeta_driver_linux::*;
    }

    /// Simulated collaborator.
    #[cfg(feature = "driver-sim")]
    pub mod sim {
        pub use ptemeta_driver_sim::*;
    }
}

/// Scenario runner.
#[cfg(feature = "harness")]
pub mod harness {
    pub use ptemeta_harness::*;
}
