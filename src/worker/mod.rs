//! Demand-driven session workers
//!
//! A worker owns one expensive external session on behalf of any number of
//! consumers. The session is opened when the first consumer attaches and
//! closed when the last one leaves; everything it produces is fanned out to
//! every attached consumer.
//!
//! # Architecture
//!
//! ```text
//!                         Supervisor<B>
//!              ┌───────────────────────────────────┐
//!   tap() ───► │ Arc<TargetRegistry<Item>>         │
//!              │   targets: Vec<Target>, wanted    │◄──┐
//!              │   wake: Notify                    │   │ put(item)
//!              └──────────────┬────────────────────┘   │
//!                             │ changed()              │
//!                             ▼                        │
//!                    control loop task ────────────────┘
//!                    (sole owner of B)
//!                      start / poll / stop / control
//!                             │
//!         ┌───────────────────┼───────────────────┐
//!         ▼                   ▼                   ▼
//!    [Consumer]          [Consumer]          [Consumer]
//!    tap.recv()          tap.recv()          blocking_recv()
//! ```
//!
//! Consumer channels are unbounded, so a slow reader never holds up the
//! control loop or the other readers.

pub mod backend;
pub mod channel;
pub mod config;
pub mod state;
pub mod supervisor;
pub mod tap;
pub mod targets;

pub use backend::SessionBackend;
pub use channel::{consumer_channel, Consumer, Target, TargetId, TryRecv};
pub use config::WorkerConfig;
pub use state::RunState;
pub use supervisor::Supervisor;
pub use tap::Tap;
pub use targets::TargetRegistry;
