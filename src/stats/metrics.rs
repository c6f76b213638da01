//! Statistics and metrics for supervised workers

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by a worker's control loop
#[derive(Debug, Default)]
pub struct WorkerCounters {
    pub(crate) start_attempts: AtomicU64,
    pub(crate) start_failures: AtomicU64,
    pub(crate) stop_attempts: AtomicU64,
    pub(crate) stop_failures: AtomicU64,
    pub(crate) poll_failures: AtomicU64,
    pub(crate) items_fanned_out: AtomicU64,
    pub(crate) commands_sent: AtomicU64,
    pub(crate) commands_failed: AtomicU64,
    pub(crate) commands_dropped: AtomicU64,
}

impl WorkerCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy
    pub fn snapshot(&self, targets: usize) -> WorkerStats {
        WorkerStats {
            start_attempts: self.start_attempts.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            stop_attempts: self.stop_attempts.load(Ordering::Relaxed),
            stop_failures: self.stop_failures.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            items_fanned_out: self.items_fanned_out.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            targets,
        }
    }
}

/// Worker-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Calls to `start`, successful or not
    pub start_attempts: u64,
    /// Failed `start` calls
    pub start_failures: u64,
    /// Calls to `stop`, including the final one on shutdown
    pub stop_attempts: u64,
    /// Failed `stop` calls
    pub stop_failures: u64,
    /// Failed `poll` calls
    pub poll_failures: u64,
    /// Items handed to the fan-out
    pub items_fanned_out: u64,
    /// Control commands delivered to the backend
    pub commands_sent: u64,
    /// Control commands the backend rejected
    pub commands_failed: u64,
    /// Control commands discarded because no session was live
    pub commands_dropped: u64,
    /// Targets registered when the snapshot was taken
    pub targets: usize,
}

impl WorkerStats {
    /// Start attempts that succeeded
    ///
    /// Counters are read one by one, so a snapshot taken mid-update may see
    /// a failure before its attempt.
    pub fn successful_starts(&self) -> u64 {
        self.start_attempts.saturating_sub(self.start_failures)
    }

    /// Stop attempts that succeeded
    pub fn successful_stops(&self) -> u64 {
        self.stop_attempts.saturating_sub(self.stop_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_stats_new() {
        let stats = WorkerCounters::new().snapshot(0);

        assert_eq!(stats, WorkerStats::default());
        assert_eq!(stats.successful_starts(), 0);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = WorkerCounters::new();
        WorkerCounters::incr(&counters.start_attempts);
        WorkerCounters::incr(&counters.start_attempts);
        WorkerCounters::incr(&counters.start_failures);
        WorkerCounters::incr(&counters.stop_attempts);
        WorkerCounters::incr(&counters.items_fanned_out);

        let stats = counters.snapshot(3);

        assert_eq!(stats.start_attempts, 2);
        assert_eq!(stats.successful_starts(), 1);
        assert_eq!(stats.successful_stops(), 1);
        assert_eq!(stats.items_fanned_out, 1);
        assert_eq!(stats.targets, 3);
    }

    #[test]
    fn test_successful_counts_never_underflow() {
        let stats = WorkerStats {
            start_attempts: 1,
            start_failures: 2,
            stop_failures: 1,
            ..WorkerStats::default()
        };

        assert_eq!(stats.successful_starts(), 0);
        assert_eq!(stats.successful_stops(), 0);
    }
}
