//! Scoped taps
//!
//! A [`Tap`] is a consumer channel that is already registered with a worker
//! and deregisters itself when dropped. Handlers hold it for as long as they
//! stream and never have to remember to clean up: normal return, `?`, panic
//! unwinding and future cancellation all run the same `Drop`.

use std::sync::Arc;

use super::channel::{consumer_channel, Consumer, TargetId, TryRecv};
use super::targets::TargetRegistry;
use crate::error::Result;

/// Registered consumer channel with guaranteed deregistration
pub struct Tap<T> {
    consumer: Consumer<T>,
    registry: Arc<TargetRegistry<T>>,
}

impl<T> Tap<T> {
    /// Create a channel and register it with `registry`
    pub(crate) fn open(registry: Arc<TargetRegistry<T>>) -> Result<Self> {
        let (target, consumer) = consumer_channel();
        registry.add(target)?;
        Ok(Self { consumer, registry })
    }

    /// Identity of the registered channel
    pub fn id(&self) -> TargetId {
        self.consumer.id()
    }

    /// Wait for the next item; `None` means the worker shut down
    pub async fn recv(&mut self) -> Option<T> {
        self.consumer.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for plain threads
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.consumer.blocking_recv()
    }

    /// Read an item if one is queued
    pub fn try_recv(&mut self) -> TryRecv<T> {
        self.consumer.try_recv()
    }

    /// Deregister early; items already queued can still be read
    ///
    /// Returns whether this call removed the channel. Dropping the tap
    /// afterwards does nothing more.
    pub fn close(&mut self) -> bool {
        let id = self.consumer.id();
        let removed = self.registry.remove(id);
        if removed {
            tracing::trace!(target_id = %id, "Tap released");
        }
        removed
    }
}

impl<T> Drop for Tap<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Disconnected;

    fn consume_until_error(tap: &mut Tap<u32>) -> std::result::Result<(), Disconnected> {
        loop {
            match tap.try_recv() {
                TryRecv::Item(3) => return Err(Disconnected),
                TryRecv::Item(_) => continue,
                TryRecv::Empty | TryRecv::Closed => return Ok(()),
            }
        }
    }

    fn handler(registry: Arc<TargetRegistry<u32>>) -> std::result::Result<usize, Disconnected> {
        let mut tap = Tap::open(registry.clone()).expect("registry open");
        for i in 1..=5 {
            registry.put(i);
        }
        consume_until_error(&mut tap)?;
        Ok(registry.len())
    }

    #[test]
    fn test_tap_registers_and_releases() {
        let registry = Arc::new(TargetRegistry::<u32>::new("test"));

        let tap = Tap::open(registry.clone()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.is_wanted());

        drop(tap);
        assert!(registry.is_empty());
        assert!(!registry.is_wanted());
    }

    #[test]
    fn test_tap_released_on_error_path() {
        let registry = Arc::new(TargetRegistry::<u32>::new("test"));
        let (other, _keep) = consumer_channel();
        registry.add(other).unwrap();
        let before = registry.len();

        let result = handler(registry.clone());

        assert!(result.is_err());
        assert_eq!(registry.len(), before);
        assert!(registry.is_wanted());
    }

    #[test]
    fn test_tap_released_on_panic() {
        let registry = Arc::new(TargetRegistry::<u32>::new("test"));

        let reg = registry.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _tap = Tap::open(reg).unwrap();
            panic!("handler blew up");
        }));

        assert!(outcome.is_err());
        assert!(registry.is_empty());
        assert!(!registry.is_wanted());
    }

    #[tokio::test]
    async fn test_tap_released_on_cancelled_future() {
        let registry = Arc::new(TargetRegistry::<u32>::new("test"));

        let reg = registry.clone();
        let streaming = tokio::spawn(async move {
            let mut tap = Tap::open(reg).unwrap();
            while tap.recv().await.is_some() {}
        });

        tokio::task::yield_now().await;
        while registry.is_empty() {
            tokio::task::yield_now().await;
        }

        streaming.abort();
        let _ = streaming.await;
        assert!(registry.is_empty());
    }

    #[test]
    fn test_explicit_close_then_drop() {
        let registry = Arc::new(TargetRegistry::<u32>::new("test"));
        let (other, _keep) = consumer_channel();
        registry.add(other).unwrap();

        let mut tap = Tap::open(registry.clone()).unwrap();
        registry.put(1);

        assert!(tap.close());
        assert!(!tap.close());
        assert_eq!(registry.len(), 1);
        assert_eq!(tap.try_recv(), TryRecv::Item(1));
        assert_eq!(tap.try_recv(), TryRecv::Closed);

        drop(tap);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_wanted());
    }

    #[test]
    fn test_tap_on_closed_registry_fails() {
        let registry = Arc::new(TargetRegistry::<u32>::new("test"));
        registry.close();

        assert!(Tap::open(registry).is_err());
    }
}
