//! Worker run state
//!
//! Tracks where a supervised session is in its lifecycle. Only the control
//! loop changes it; everyone else observes it through a `watch` channel.

use std::fmt;

/// Lifecycle state of a supervised session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Start requested, waiting for holdoff or retrying `start`
    Starting,
    /// Session is live and being polled
    Running,
    /// Stop requested, waiting for holdoff or retrying `stop`
    Stopping,
    /// No session allocated
    #[default]
    Stopped,
}

impl RunState {
    /// Check if the backend session is live
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }

    /// Check if a start or stop is still in flight
    pub fn is_transitioning(self) -> bool {
        matches!(self, RunState::Starting | RunState::Stopping)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = RunState::default();

        assert_eq!(state, RunState::Stopped);
        assert!(!state.is_running());
        assert!(!state.is_transitioning());
    }

    #[test]
    fn test_transitioning_states() {
        assert!(RunState::Starting.is_transitioning());
        assert!(RunState::Stopping.is_transitioning());
        assert!(!RunState::Running.is_transitioning());
        assert!(RunState::Running.is_running());
    }

    #[test]
    fn test_display() {
        assert_eq!(RunState::Running.to_string(), "running");
        assert_eq!(RunState::Stopping.to_string(), "stopping");
    }
}
