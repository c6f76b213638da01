//! Error types
//!
//! [`BackendError`] is what session backends report from their lifecycle
//! calls. [`Error`] is what the gateway surface reports to callers.

use std::fmt;

/// Result alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a session backend
#[derive(Debug)]
pub enum BackendError {
    /// Could not open the underlying session
    Connect(String),
    /// The session rejected or failed a command
    Command(String),
    /// I/O failure on the underlying transport
    Io(std::io::Error),
    /// Operation requires a live session but none is open
    NotConnected,
    /// Anything else the backend wants to surface
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Connect(msg) => write!(f, "Connect failed: {}", msg),
            BackendError::Command(msg) => write!(f, "Command failed: {}", msg),
            BackendError::Io(e) => write!(f, "I/O error: {}", e),
            BackendError::NotConnected => write!(f, "Session not connected"),
            BackendError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e)
    }
}

/// Error type for gateway operations
#[derive(Debug)]
pub enum Error {
    /// A backend call failed
    Backend(BackendError),
    /// The worker has been shut down and no longer accepts consumers
    Closed,
    /// The worker's control loop panicked
    WorkerPanicked(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Backend(e) => write!(f, "Backend error: {}", e),
            Error::Closed => write!(f, "Worker is shut down"),
            Error::WorkerPanicked(name) => write!(f, "Worker panicked: {}", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Connect("broker unreachable".into());
        assert_eq!(err.to_string(), "Connect failed: broker unreachable");
        assert_eq!(BackendError::NotConnected.to_string(), "Session not connected");
    }

    #[test]
    fn test_io_error_has_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err: Error = BackendError::from(io).into();

        assert!(matches!(err, Error::Backend(BackendError::Io(_))));
        assert!(err.source().is_some());
        assert!(err.source().and_then(|e| e.source()).is_some());
    }
}
