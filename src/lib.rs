//! Demand-driven session workers for a local device gateway
//!
//! A device that only speaks proprietary transports (a broker connection and
//! a peer video session) is exposed to any number of local clients. Each
//! transport session is owned by one [`Supervisor`](worker::Supervisor): it
//! is opened when the first client taps it, closed when the last one leaves,
//! retried with a fixed holdoff when opening or closing fails, and every
//! item it produces is fanned out to all attached clients.
//!
//! # Modules
//!
//! - [`worker`]: supervisor control loop, target registry, scoped taps
//! - [`backend`]: broker and video session backends
//! - [`gateway`]: the two workers wired together with control passthrough
//! - [`stats`]: per-worker counters
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use devgate::error::BackendError;
//! use devgate::worker::{SessionBackend, Supervisor, WorkerConfig};
//!
//! struct Ticker(u64);
//!
//! impl SessionBackend for Ticker {
//!     type Item = u64;
//!     type Command = ();
//!
//!     async fn start(&mut self) -> Result<(), BackendError> { Ok(()) }
//!     async fn poll(&mut self, timeout: Duration) -> Result<Option<u64>, BackendError> {
//!         tokio::time::sleep(timeout).await;
//!         self.0 += 1;
//!         Ok(Some(self.0))
//!     }
//!     async fn stop(&mut self) -> Result<(), BackendError> { Ok(()) }
//!     async fn control(&mut self, _: ()) -> Result<(), BackendError> { Ok(()) }
//! }
//!
//! # async fn example() -> devgate::Result<()> {
//! let worker = Supervisor::spawn("ticker", Ticker(0), WorkerConfig::default());
//! {
//!     let mut tap = worker.tap()?;
//!     let first = tap.recv().await;
//!     println!("got {:?}", first);
//! } // last tap gone, the session is stopped
//! worker.shutdown().await
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod gateway;
pub mod stats;
pub mod worker;

pub use error::{BackendError, Error, Result};
pub use gateway::{ControlMessage, Gateway, GatewayConfig};
pub use stats::WorkerStats;
pub use worker::{RunState, SessionBackend, Supervisor, Tap, WorkerConfig};
