//! Hand-off queues between pipeline stages.
//!
//! Stages and the controller only see `Arc<dyn HandoffQueue<T>>`, so tests can
//! swap in their own FIFO. The shipped implementation is [`ChannelQueue`], a
//! crossbeam channel whose two ends live in the same struct: `push` is a
//! non-blocking send and `pop` a non-blocking receive, which makes it a
//! lock-free MPMC FIFO with no external locking.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// FIFO that owns whatever is pushed into it until it is popped or drained.
pub trait HandoffQueue<T>: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Transfer ownership of `item` into the queue. Never blocks.
    fn push(&self, item: T);

    /// Transfer ownership of the oldest item out, if any. Never blocks.
    fn pop(&self) -> Option<T>;

    /// Remove every item queued at the time of the call, handing each to
    /// `reclaim`. Items pushed concurrently after the call starts may stay.
    fn drain_all(&self, reclaim: &mut dyn FnMut(T)) -> usize;

    /// Number of queued items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `drain_all` that simply drops each item.
    fn drain(&self) -> usize {
        self.drain_all(&mut |item| drop(item))
    }
}

/// What a bounded queue does when a push finds it full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the item being pushed.
    #[default]
    DropNewest,
    /// Evict the oldest queued item to make room.
    DropOldest,
}

/// Crossbeam-backed [`HandoffQueue`].
pub struct ChannelQueue<T> {
    name: String,
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: Option<usize>,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T: Send> ChannelQueue<T> {
    /// Unbounded queue: `push` always succeeds.
    pub fn unbounded(name: impl Into<String>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            name: name.into(),
            tx,
            rx,
            capacity: None,
            policy: OverflowPolicy::default(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Bounded queue that applies `policy` on overflow.
    ///
    /// A capacity of zero is raised to one; a rendezvous channel could never
    /// hold an item between a non-blocking push and pop.
    pub fn bounded(name: impl Into<String>, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            name: name.into(),
            tx,
            rx,
            capacity: Some(capacity),
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    /// Build from an optional capacity: `None` means unbounded.
    pub fn with_capacity(
        name: impl Into<String>,
        capacity: Option<usize>,
        policy: OverflowPolicy,
    ) -> Self {
        match capacity {
            Some(cap) => Self::bounded(name, cap, policy),
            None => Self::unbounded(name),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items discarded by the overflow policy since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!("Queue '{}' overflow, {} items dropped so far", self.name, total);
    }
}

impl<T: Send> HandoffQueue<T> for ChannelQueue<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, item: T) {
        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => match self.policy {
                    OverflowPolicy::DropNewest => {
                        drop(rejected);
                        self.record_drop();
                        return;
                    }
                    OverflowPolicy::DropOldest => {
                        if self.rx.try_recv().is_ok() {
                            self.record_drop();
                        }
                        item = rejected;
                    }
                },
                // Both ends live in `self`, so this only happens while dropping.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    fn drain_all(&self, reclaim: &mut dyn FnMut(T)) -> usize {
        let queued = self.rx.len();
        let mut count = 0;
        while count < queued {
            match self.rx.try_recv() {
                Ok(item) => {
                    reclaim(item);
                    count += 1;
                }
                Err(_) => break,
            }
        }
        count
    }

    fn len(&self) -> usize {
        self.rx.len()
    }
}

impl<T> std::fmt::Debug for ChannelQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelQueue")
            .field("name", &self.name)
            .field("len", &self.rx.len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .finish()
    }
}
