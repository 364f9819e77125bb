//! Runs the scenario catalog against the simulated collaborator, once as a
//! conforming implementation and once with every fault enabled.

use ptemeta::{
    StatsCollector,
    driver::sim::{SimConfig, SimDriver, SimFaults},
    harness::{HarnessConfig, ScenarioRunner, catalog},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    let config = HarnessConfig::default()
        .with_pinning(false)
        .with_stress_iterations(1_000);

    for faults in [SimFaults::empty(), SimFaults::all()] {
        println!("faults: {faults:?}");

        let mut totals = StatsCollector::new();
        let mut failed = 0;

        for scenario in catalog::all(&config) {
            // Each scenario gets a collaborator that honours its contract.
            let driver = SimDriver::new(
                SimConfig::default()
                    .with_model(scenario.model)
                    .with_faults(faults),
            )?;

            let report = ScenarioRunner::new(driver, config.clone())?.run(&scenario);
            if !report.is_passed() {
                failed += 1;
            }

            totals.merge(&report.stats);
            print!("{report}");
        }

        println!("{failed} scenario(s) failed");

        for name in totals.names() {
            if let Some(summary) = totals.summarize(name) {
                println!("  total {name:<24} {summary}");
            }
        }

        println!();
    }

    Ok(())
}
