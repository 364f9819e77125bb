//! Runs the scenario catalog against the running kernel.
//!
//! Usage: `linux-conformance [SCENARIO]...`
//!
//! Without arguments every canonical scenario of the default contract runs.
//! Scenarios of the other contract choices can be named explicitly. The
//! process exits with status 1 if any scenario fails.

use ptemeta::{
    PteMetaError,
    driver::linux::{LinuxConfig, LinuxDriver},
    harness::{HarnessConfig, Scenario, ScenarioRunner, catalog},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = HarnessConfig::default();
    let scenarios = select(&config, std::env::args().skip(1))?;

    let driver = match LinuxDriver::new(LinuxConfig::default()) {
        Ok(driver) => driver,
        Err(PteMetaError::NotSupported) => {
            tracing::error!("the running kernel does not implement the metadata syscalls");
            std::process::exit(2);
        }
        Err(err) => return Err(err.into()),
    };

    let runner = ScenarioRunner::new(driver, config)?;
    let reports = runner.run_all(&scenarios);

    for report in &reports {
        print!("{report}");
    }

    let failed = reports.iter().filter(|report| !report.is_passed()).count();
    println!("{} passed, {failed} failed", reports.len() - failed);

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn select(
    config: &HarnessConfig,
    names: impl Iterator<Item = String>,
) -> Result<Vec<Scenario>, Box<dyn std::error::Error>> {
    let names = names.collect::<Vec<_>>();
    if names.is_empty() {
        return Ok(catalog::all(config));
    }

    names
        .iter()
        .map(|name| {
            catalog::by_name(config, name)
                .ok_or_else(|| Box::from(format!("unknown scenario `{name}`")))
        })
        .collect()
}
