//! Worker configuration

use std::time::Duration;

/// Shortest allowed bounded-wait granularity
const MIN_WAIT_TICK: Duration = Duration::from_millis(1);

/// Shortest allowed retry holdoff; a failed start or stop always waits
pub(crate) const MIN_HOLDOFF: Duration = Duration::from_millis(1);

/// Timing options for one supervised worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Upper bound for a single `poll` call on the backend
    pub poll_timeout: Duration,

    /// Delay before retrying a failed start or stop
    pub holdoff: Duration,

    /// Granularity of the bounded wait while a holdoff is pending
    pub wait_tick: Duration,

    /// How long a running session is kept after the last consumer leaves
    /// (zero = stop right away)
    pub idle_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(300),
            holdoff: Duration::from_secs(1),
            wait_tick: Duration::from_millis(100),
            idle_timeout: Duration::ZERO,
        }
    }
}

impl WorkerConfig {
    /// Set the per-poll timeout
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the retry holdoff (at least 1 ms)
    pub fn holdoff(mut self, holdoff: Duration) -> Self {
        self.holdoff = holdoff.max(MIN_HOLDOFF);
        self
    }

    /// Set the bounded wait granularity
    pub fn wait_tick(mut self, tick: Duration) -> Self {
        self.wait_tick = tick.max(MIN_WAIT_TICK);
        self
    }

    /// Keep the session alive for `timeout` after the last consumer leaves
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();

        assert_eq!(config.poll_timeout, Duration::from_millis(300));
        assert_eq!(config.holdoff, Duration::from_secs(1));
        assert_eq!(config.wait_tick, Duration::from_millis(100));
        assert_eq!(config.idle_timeout, Duration::ZERO);
    }

    #[test]
    fn test_builder_wait_tick_clamped() {
        let config = WorkerConfig::default().wait_tick(Duration::ZERO);

        assert_eq!(config.wait_tick, MIN_WAIT_TICK);
    }

    #[test]
    fn test_builder_holdoff_clamped() {
        let config = WorkerConfig::default().holdoff(Duration::ZERO);

        assert_eq!(config.holdoff, MIN_HOLDOFF);
    }

    #[test]
    fn test_builder_chaining() {
        let config = WorkerConfig::default()
            .poll_timeout(Duration::from_millis(50))
            .holdoff(Duration::from_millis(250))
            .wait_tick(Duration::from_millis(10))
            .idle_timeout(Duration::from_secs(5));

        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.holdoff, Duration::from_millis(250));
        assert_eq!(config.wait_tick, Duration::from_millis(10));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }
}
