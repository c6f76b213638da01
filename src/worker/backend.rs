//! Session backend contract
//!
//! A backend wraps one expensive external session (a broker connection, a
//! peer video session). The worker's control loop is its only caller, so
//! implementations take `&mut self` and need no internal locking.

use std::future::Future;
use std::time::Duration;

use crate::error::BackendError;

/// Lifecycle interface of a supervised external session
///
/// Calls never overlap: the control loop awaits each one before issuing the
/// next. `start` may be retried after a failure and must tolerate being
/// called again on a half-opened session.
pub trait SessionBackend: Send + 'static {
    /// Unit of data fanned out to consumers
    type Item: Clone + Send + 'static;

    /// Out-of-band command forwarded straight to the live session
    type Command: Send + 'static;

    /// Open the external session
    fn start(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Wait up to `timeout` for one item
    ///
    /// `Ok(None)` means nothing arrived in time, not an error.
    fn poll(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Self::Item>, BackendError>> + Send;

    /// Release the external session
    fn stop(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Send a side command to the live session
    ///
    /// Only called while the session is running. Nothing it produces is
    /// fanned out.
    fn control(
        &mut self,
        command: Self::Command,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}
