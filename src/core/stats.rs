//! Load statistics

use std::collections::VecDeque;
use std::time::Duration;

/// Counters and fetch timings for one stage
#[derive(Debug, Clone)]
pub struct LoadStats {
    /// Fetch duration history for averaging
    fetch_times: VecDeque<Duration>,
    /// Maximum samples to keep
    max_samples: usize,
    /// Fetches handed to the asset source
    fetches_started: u64,
    /// Requests that joined a fetch already in flight
    joins: u64,
    /// Requests served by cloning a cached template
    cache_hits: u64,
    /// Fetches that failed or were aborted
    failures: u64,
    /// Instances placed in the scene
    materialized: u64,
}

impl LoadStats {
    /// Create a new stats tracker keeping `max_samples` fetch timings
    pub fn new(max_samples: usize) -> Self {
        Self {
            fetch_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            fetches_started: 0,
            joins: 0,
            cache_hits: 0,
            failures: 0,
            materialized: 0,
        }
    }

    pub(crate) fn record_fetch_started(&mut self) {
        self.fetches_started += 1;
    }

    pub(crate) fn record_join(&mut self) {
        self.joins += 1;
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub(crate) fn record_materialized(&mut self) {
        self.materialized += 1;
    }

    /// Record how a fetch settled and how long it took
    pub(crate) fn record_fetch_settled(&mut self, elapsed: Duration, ok: bool) {
        if !ok {
            self.failures += 1;
        }
        if self.fetch_times.len() >= self.max_samples {
            self.fetch_times.pop_front();
        }
        self.fetch_times.push_back(elapsed);
    }

    /// Fetches handed to the asset source
    pub fn fetches_started(&self) -> u64 {
        self.fetches_started
    }

    /// Requests that joined a fetch already in flight
    pub fn joins(&self) -> u64 {
        self.joins
    }

    /// Requests served from the template cache
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Fetches that failed or were aborted
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Instances placed in the scene
    pub fn materialized(&self) -> u64 {
        self.materialized
    }

    /// Average settled fetch time over the sample window
    pub fn avg_fetch_time(&self) -> Duration {
        let count = self.fetch_times.len() as u32;
        if count == 0 {
            return Duration::ZERO;
        }
        self.fetch_times.iter().sum::<Duration>() / count
    }

    /// Slowest settled fetch in the sample window
    pub fn max_fetch_time(&self) -> Duration {
        self.fetch_times.iter().copied().max().unwrap_or_default()
    }

    /// Get a formatted stats string
    pub fn format_stats(&self) -> String {
        format!(
            "fetches: {} (failed {}) | joins: {} | cache hits: {} | instances: {} | fetch: {:.2}ms avg, {:.2}ms max",
            self.fetches_started,
            self.failures,
            self.joins,
            self.cache_hits,
            self.materialized,
            self.avg_fetch_time().as_secs_f32() * 1000.0,
            self.max_fetch_time().as_secs_f32() * 1000.0,
        )
    }
}

impl Default for LoadStats {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_window() {
        let mut stats = LoadStats::new(2);
        stats.record_fetch_settled(Duration::from_millis(10), true);
        stats.record_fetch_settled(Duration::from_millis(20), false);
        stats.record_fetch_settled(Duration::from_millis(40), true);

        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.avg_fetch_time(), Duration::from_millis(30));
        assert_eq!(stats.max_fetch_time(), Duration::from_millis(40));
    }

    #[test]
    fn test_empty_stats() {
        let stats = LoadStats::default();
        assert_eq!(stats.avg_fetch_time(), Duration::ZERO);
        assert!(stats.format_stats().contains("fetches: 0"));
    }
}
