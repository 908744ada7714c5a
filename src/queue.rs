//! Fixed-capacity FIFO used for the classifier inbox, the priority lanes and the port inboxes.
//!
//! The queue wraps a bounded crossbeam channel. Pushes never block: a full queue hands the item
//! back in [`QueueError::Full`]. Consumers pick between a blocking, a timed and a non-blocking pop.
//! Length comes straight from the channel; the high watermark is kept next to it so statistics can
//! be read without draining anything.

use crate::error::QueueError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default capacity for lanes and port inboxes.
pub const DEFAULT_CAPACITY: usize = 1024;

pub struct BoundedQueue<T> {
    name: &'static str,
    capacity: usize,
    sender: Sender<T>,
    receiver: Receiver<T>,
    /// Maximum length observed since the last reset.
    watermark: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is zero (a rendezvous channel would make every push fail).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        assert!(capacity > 0, "queue {name} needs a non-zero capacity");
        let (sender, receiver) = bounded(capacity);
        Self {
            name,
            capacity,
            sender,
            receiver,
            watermark: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue `item` without blocking.
    ///
    /// Either the item is fully enqueued and the watermark updated, or the queue is left untouched
    /// and the item comes back in the error.
    ///
    /// # Arguments
    /// * `item` - Value to enqueue; ownership moves into the queue on success
    ///
    /// # Returns
    /// `Ok(())` once the item is enqueued, or `Err(QueueError::Full(item))` when the queue already
    /// holds `capacity` items.
    pub fn push(&self, item: T) -> Result<(), QueueError<T>> {
        match self.sender.try_send(item) {
            Ok(()) => {
                // Read after the send: the item is included, and anything already popped is not.
                self.watermark
                    .fetch_max(self.sender.len(), Ordering::AcqRel);
                Ok(())
            }
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => {
                Err(QueueError::Full(item))
            }
        }
    }

    /// Dequeue the oldest item, suspending the caller until one is available.
    pub fn pop_blocking(&self) -> T {
        // The queue owns both channel ends, so the channel can never disconnect while `self` lives.
        self.receiver
            .recv()
            .expect("queue owns its sender; channel cannot disconnect")
    }

    /// Dequeue the oldest item, waiting at most `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Dequeue the oldest item if one is present, never blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Maximum length observed since the last [`reset_watermark`](Self::reset_watermark).
    pub fn watermark(&self) -> usize {
        self.watermark.load(Ordering::Acquire)
    }

    /// Start a new sampling window. The watermark drops to the current length, never below it.
    pub fn reset_watermark(&self) {
        self.watermark.store(self.len(), Ordering::Release);
    }

    /// Drain every queued item without blocking.
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.try_pop()).collect()
    }
}
