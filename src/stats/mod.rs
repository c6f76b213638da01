//! Statistics for supervised workers

pub mod metrics;

pub use metrics::{WorkerCounters, WorkerStats};
