use std::time::Duration;

use ptemeta_core::{PteMetaError, StatsCollector, Summary};

/// Final verdict of a scenario.
#[derive(Debug)]
pub enum Verdict {
    /// Every step and assertion held.
    Passed,

    /// The scenario stopped at the first failure.
    Failed {
        /// Stage that failed.
        stage: String,

        /// What went wrong.
        error: PteMetaError,
    },
}

impl Verdict {
    /// Checks whether the scenario passed.
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Passed => f.write_str("PASS"),
            Self::Failed { stage, error } => write!(f, "FAIL at {stage}: {error}"),
        }
    }
}

/// Result of running one scenario.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Name of the scenario.
    pub name: String,

    /// The verdict.
    pub verdict: Verdict,

    /// Timings of the setup and operate phases.
    pub stats: StatsCollector,

    /// Wall-clock time of the whole scenario.
    pub elapsed: Duration,
}

impl ScenarioReport {
    /// Checks whether the scenario passed.
    pub fn is_passed(&self) -> bool {
        self.verdict.is_passed()
    }

    /// Returns the summary of every recorded operation, in recording order.
    pub fn summaries(&self) -> Vec<(&'static str, Summary)> {
        self.stats
            .names()
            .filter_map(|name| Some((name, self.stats.summarize(name)?)))
            .collect()
    }
}

impl std::fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{}: {} ({:?})", self.name, self.verdict, self.elapsed)?;

        for (name, summary) in self.summaries() {
            write!(f, "  {name:<24} {summary}")?;

            if let Some(throughput) = self.stats.throughput(name) {
                write!(f, " ({throughput:.0} ops/s)")?;
            }

            writeln!(f)?;
        }

        Ok(())
    }
}
