//! Consumer channels
//!
//! A consumer channel is an unbounded queue with two halves: the [`Target`]
//! lives in a worker's registry and receives fanned-out items, the
//! [`Consumer`] is held by whoever reads them. Once the target is dropped
//! (deregistration or worker shutdown) the consumer drains what is queued
//! and then sees end-of-stream.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered consumer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        TargetId(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target-{}", self.0)
    }
}

/// Writer half of a consumer channel, owned by a target registry
#[derive(Debug)]
pub struct Target<T> {
    id: TargetId,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Target<T> {
    /// Identity of this channel
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Push an item; returns false if the reader is gone
    pub(crate) fn push(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    /// Check if the reader half has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Result of a non-blocking read
#[derive(Debug, PartialEq, Eq)]
pub enum TryRecv<T> {
    /// An item was queued
    Item(T),
    /// Nothing queued right now
    Empty,
    /// The writer is gone and the queue is drained
    Closed,
}

/// Reader half of a consumer channel
#[derive(Debug)]
pub struct Consumer<T> {
    id: TargetId,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Consumer<T> {
    /// Identity shared with the matching [`Target`]
    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Wait for the next item
    ///
    /// Returns `None` once the channel has been deregistered and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Wait for the next item from a plain (non-async) thread
    ///
    /// Must not be called from within an async context.
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }

    /// Read an item if one is queued
    pub fn try_recv(&mut self) -> TryRecv<T> {
        match self.rx.try_recv() {
            Ok(item) => TryRecv::Item(item),
            Err(mpsc::error::TryRecvError::Empty) => TryRecv::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => TryRecv::Closed,
        }
    }
}

/// Create a new, unregistered consumer channel
pub fn consumer_channel<T>() -> (Target<T>, Consumer<T>) {
    let id = TargetId::next();
    let (tx, rx) = mpsc::unbounded_channel();
    (Target { id, tx }, Consumer { id, rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let (a, _ra) = consumer_channel::<u32>();
        let (b, _rb) = consumer_channel::<u32>();

        assert_ne!(a.id(), b.id());
        assert!(b.id().as_u64() > a.id().as_u64());
    }

    #[test]
    fn test_push_and_try_recv() {
        let (target, mut consumer) = consumer_channel::<u32>();
        assert_eq!(consumer.id(), target.id());

        assert!(target.push(1));
        assert!(target.push(2));
        assert_eq!(consumer.try_recv(), TryRecv::Item(1));
        assert_eq!(consumer.try_recv(), TryRecv::Item(2));
        assert_eq!(consumer.try_recv(), TryRecv::Empty);

        drop(target);
        assert_eq!(consumer.try_recv(), TryRecv::Closed);
    }

    #[test]
    fn test_push_after_reader_dropped() {
        let (target, consumer) = consumer_channel::<u32>();
        drop(consumer);

        assert!(target.is_closed());
        assert!(!target.push(7));
    }

    #[tokio::test]
    async fn test_recv_drains_then_ends() {
        let (target, mut consumer) = consumer_channel::<&'static str>();
        target.push("a");
        target.push("b");
        drop(target);

        assert_eq!(consumer.recv().await, Some("a"));
        assert_eq!(consumer.recv().await, Some("b"));
        assert_eq!(consumer.recv().await, None);
    }

    #[test]
    fn test_blocking_recv_from_thread() {
        let (target, mut consumer) = consumer_channel::<u32>();

        let reader = std::thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(item) = consumer.blocking_recv() {
                seen.push(item);
            }
            seen
        });

        for i in 0..5 {
            target.push(i);
        }
        drop(target);

        assert_eq!(reader.join().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
