//! Target registry implementation
//!
//! The set of consumer channels currently attached to one worker. Any task
//! or thread may add and remove targets; the worker's control loop reads
//! the demand flag and fans items out through [`TargetRegistry::put`].
//!
//! The demand flag (`wanted`) lives under the same lock as the target list,
//! so it always equals "registry non-empty" as observed by any caller.

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::channel::{Target, TargetId};
use crate::error::{Error, Result};

struct Inner<T> {
    targets: Vec<Target<T>>,
    wanted: bool,
    closed: bool,
}

/// Registry of consumer channels for one worker
pub struct TargetRegistry<T> {
    name: String,
    inner: Mutex<Inner<T>>,
    wake: Notify,
}

impl<T> TargetRegistry<T> {
    /// Create an empty registry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                targets: Vec::new(),
                wanted: false,
                closed: false,
            }),
            wake: Notify::new(),
        }
    }

    /// Register a consumer channel
    ///
    /// The first target on an empty registry raises demand and wakes the
    /// control loop. Fails once the registry has been closed.
    pub fn add(&self, target: Target<T>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Closed);
        }

        let id = target.id();
        let first = inner.targets.is_empty();
        inner.targets.push(target);

        if first {
            inner.wanted = true;
            drop(inner);
            tracing::info!(worker = %self.name, target_id = %id, "First target added, requesting start");
            self.wake.notify_one();
        } else {
            tracing::debug!(
                worker = %self.name,
                target_id = %id,
                targets = inner.targets.len(),
                "Target added"
            );
        }

        Ok(())
    }

    /// Deregister a consumer channel
    ///
    /// Returns whether the target was present. Removing the last target
    /// drops demand and wakes the control loop.
    pub fn remove(&self, id: TargetId) -> bool {
        let mut inner = self.inner.lock();

        let Some(pos) = inner.targets.iter().position(|t| t.id() == id) else {
            return false;
        };
        inner.targets.remove(pos);

        if inner.targets.is_empty() {
            inner.wanted = false;
            drop(inner);
            tracing::info!(worker = %self.name, target_id = %id, "Last target removed, requesting stop");
            self.wake.notify_one();
        } else {
            tracing::debug!(
                worker = %self.name,
                target_id = %id,
                targets = inner.targets.len(),
                "Target removed"
            );
        }

        true
    }

    /// Check whether any consumer currently wants the session
    pub fn is_wanted(&self) -> bool {
        self.inner.lock().wanted
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.inner.lock().targets.len()
    }

    /// Check if no targets are registered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().targets.is_empty()
    }

    /// Check if the registry has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Wait until demand may have changed
    ///
    /// A wake that happened while nobody was waiting is kept and completes
    /// the next call immediately, so checking [`is_wanted`](Self::is_wanted)
    /// and then awaiting this never misses a change.
    pub(crate) async fn changed(&self) {
        self.wake.notified().await;
    }

    /// Drop every target and refuse new ones
    ///
    /// Readers of the dropped targets see end-of-stream once drained.
    pub(crate) fn close(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.wanted = false;
        let dropped = std::mem::take(&mut inner.targets).len();
        drop(inner);

        self.wake.notify_one();
        dropped
    }
}

impl<T: Clone> TargetRegistry<T> {
    /// Fan an item out to every registered target
    ///
    /// Never blocks. Targets whose reader has gone away are pruned here, with
    /// the same demand bookkeeping as [`remove`](Self::remove). Returns the
    /// number of targets that received the item.
    pub(crate) fn put(&self, item: T) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.targets.len();

        inner.targets.retain(|target| target.push(item.clone()));

        let delivered = inner.targets.len();
        if delivered < before {
            tracing::debug!(
                worker = %self.name,
                pruned = before - delivered,
                "Pruned targets with closed readers"
            );
            if delivered == 0 {
                inner.wanted = false;
                drop(inner);
                self.wake.notify_one();
            }
        }

        delivered
    }
}
