//! Timing statistics.
//!
//! Samples are kept per operation name in recording order. Summaries use the
//! population standard deviation.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

/// Summary of the samples recorded under one name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Number of samples.
    pub count: usize,

    /// Sum of all samples.
    pub total: Duration,

    /// Fastest sample in nanoseconds.
    pub min_ns: u128,

    /// Slowest sample in nanoseconds.
    pub max_ns: u128,

    /// Arithmetic mean in nanoseconds.
    pub mean_ns: f64,

    /// Population standard deviation in nanoseconds.
    pub stddev_ns: f64,
}

impl Summary {
    /// Returns the mean as a [`Duration`].
    pub fn mean(&self) -> Duration {
        Duration::from_nanos(self.mean_ns as u64)
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "n={} min={}ns max={}ns mean={:.2}ns stddev={:.2}ns",
            self.count, self.min_ns, self.max_ns, self.mean_ns, self.stddev_ns
        )
    }
}

/// Collects timing samples keyed by operation name.
#[derive(Debug, Default, Clone)]
pub struct StatsCollector {
    samples: IndexMap<&'static str, Vec<Duration>>,
}

impl StatsCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample.
    pub fn record(&mut self, name: &'static str, duration: Duration) {
        self.samples.entry(name).or_default().push(duration);
    }

    /// Returns the samples of `name` in recording order.
    pub fn samples(&self, name: &str) -> &[Duration] {
        self.samples.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the recorded names in first-recorded order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.samples.keys().copied()
    }

    /// Checks whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Summarizes the samples of `name`, or `None` if there are none.
    pub fn summarize(&self, name: &str) -> Option<Summary> {
        let samples = self.samples.get(name)?;
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let total = samples.iter().sum::<Duration>();
        let min_ns = samples.iter().map(Duration::as_nanos).min()?;
        let max_ns = samples.iter().map(Duration::as_nanos).max()?;
        let mean_ns = total.as_nanos() as f64 / count as f64;

        let variance = samples
            .iter()
            .map(|sample| {
                let delta = sample.as_nanos() as f64 - mean_ns;
                delta * delta
            })
            .sum::<f64>()
            / count as f64;

        Some(Summary {
            count,
            total,
            min_ns,
            max_ns,
            mean_ns,
            stddev_ns: variance.sqrt(),
        })
    }

    /// Returns operations per second for `name`.
    ///
    /// Returns `None` if there are no samples or their total is zero.
    pub fn throughput(&self, name: &str) -> Option<f64> {
        let summary = self.summarize(name)?;
        let seconds = summary.total.as_secs_f64();
        if seconds == 0.0 {
            return None;
        }

        Some(summary.count as f64 / seconds)
    }

    /// Appends all samples of `other`.
    pub fn merge(&mut self, other: &StatsCollector) {
        for (name, samples) in &other.samples {
            self.samples
                .entry(*name)
                .or_default()
                .extend_from_slice(samples);
        }
    }

    /// Removes all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(value: u64) -> Duration {
        Duration::from_nanos(value)
    }

    #[test]
    fn summary_uses_population_stddev() {
        let mut stats = StatsCollector::new();
        for value in [2, 4, 4, 4, 5, 5, 7, 9] {
            stats.record("op", ns(value));
        }

        let summary = stats.summarize("op").expect("summary");
        assert_eq!(summary.count, 8);
        assert_eq!(summary.min_ns, 2);
        assert_eq!(summary.max_ns, 9);
        assert_eq!(summary.total, ns(40));
        assert!((summary.mean_ns - 5.0).abs() < 1e-9);
        assert!((summary.stddev_ns - 2.0).abs() < 1e-9);
    }

    #[test]
    fn single_sample() {
        let mut stats = StatsCollector::new();
        stats.record("op", ns(100));

        let summary = stats.summarize("op").expect("summary");
        assert_eq!(summary.min_ns, 100);
        assert_eq!(summary.max_ns, 100);
        assert_eq!(summary.stddev_ns, 0.0);
    }

    #[test]
    fn unknown_name() {
        let stats = StatsCollector::new();
        assert!(stats.summarize("missing").is_none());
        assert!(stats.throughput("missing").is_none());
        assert!(stats.samples("missing").is_empty());
    }

    #[test]
    fn throughput() {
        let mut stats = StatsCollector::new();
        for _ in 0..4 {
            stats.record("op", Duration::from_millis(250));
        }

        let ops = stats.throughput("op").expect("throughput");
        assert!((ops - 4.0).abs() < 1e-9);

        stats.record("zero", Duration::ZERO);
        assert!(stats.throughput("zero").is_none());
    }

    #[test]
    fn names_keep_recording_order() {
        let mut stats = StatsCollector::new();
        stats.record("set", ns(1));
        stats.record("enable", ns(1));
        stats.record("set", ns(2));

        assert_eq!(stats.names().collect::<Vec<_>>(), ["set", "enable"]);
        assert_eq!(stats.samples("set"), [ns(1), ns(2)]);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut left = StatsCollector::new();
        left.record("op", ns(1));
        left.record("op", ns(5));

        let mut right = StatsCollector::new();
        right.record("op", ns(3));
        right.record("other", ns(7));

        let mut a = left.clone();
        a.merge(&right);
        let mut b = right.clone();
        b.merge(&left);

        assert_eq!(a.summarize("op"), b.summarize("op"));
        assert_eq!(a.summarize("other"), b.summarize("other"));
        assert_eq!(a.samples("op").len(), 3);
    }
}
