//! FIFO work queue using crossbeam channels.

use super::{RecvError, SendError};
use crate::core::{CancellationReason, CancellationToken};
use crossbeam_channel::{self as channel, Receiver, SendTimeoutError, Sender, TryRecvError};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// How often a producer blocked on a full queue re-checks for close
const CLOSE_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// A FIFO queue shared by one producer and a pool of workers.
///
/// # Example
///
/// ```rust
/// use bottling_plant::queue::{RecvError, WorkQueue};
/// use std::time::Duration;
///
/// let queue = WorkQueue::unbounded();
/// queue.send(1).unwrap();
/// queue.send(2).unwrap();
///
/// assert_eq!(queue.recv_timeout(Duration::from_millis(10)), Ok(1));
/// assert_eq!(queue.recv_timeout(Duration::from_millis(10)), Ok(2));
/// assert_eq!(
///     queue.recv_timeout(Duration::from_millis(10)),
///     Err(RecvError::Empty)
/// );
/// ```
pub struct WorkQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: Option<usize>,
    closed: CancellationToken,
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> WorkQueue<T> {
    /// Creates a queue with no capacity limit; `send` never blocks.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a queue holding at most `capacity` items; `send` blocks while full.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Creates a bounded queue for `Some(capacity)`, unbounded for `None`.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(cap) => channel::bounded(cap),
            None => channel::unbounded(),
        };
        Self {
            sender,
            receiver,
            capacity,
            closed: CancellationToken::new(),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
        }
    }

    /// Enqueue an item, blocking while a bounded queue is full.
    ///
    /// # Errors
    ///
    /// Returns the item inside a `SendError` if the queue is (or becomes)
    /// closed before the item could be enqueued.
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        let mut item = item;
        loop {
            if self.is_closed() {
                return Err(SendError(item));
            }
            match self.sender.send_timeout(item, CLOSE_CHECK_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(back)) => item = back,
                Err(SendTimeoutError::Disconnected(back)) => return Err(SendError(back)),
            }
        }
    }

    /// Take the next item, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvError> {
        // A token that is never cancelled
        let never = CancellationToken::new();
        self.recv_cancellable(timeout, &never)
    }

    /// Take the next item, waiting at most `timeout` or until `token` is
    /// cancelled.
    ///
    /// A closed queue still hands out its remaining items; once it is both
    /// closed and empty every take returns `RecvError::Disconnected`.
    pub fn recv_cancellable(&self, timeout: Duration, token: &CancellationToken) -> Result<T, RecvError> {
        if self.is_closed() && self.receiver.is_empty() {
            return Err(RecvError::Disconnected);
        }

        let result = channel::select! {
            recv(self.receiver) -> msg => msg.map_err(|_| RecvError::Disconnected),
            recv(token.cancelled()) -> _ => Err(RecvError::Cancelled),
            recv(self.closed.cancelled()) -> _ => match self.receiver.try_recv() {
                Ok(item) => Ok(item),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Err(RecvError::Disconnected),
            },
            default(timeout) => {
                if self.is_closed() && self.receiver.is_empty() {
                    Err(RecvError::Disconnected)
                } else {
                    Err(RecvError::Empty)
                }
            }
        };

        if result.is_ok() {
            self.notify_if_drained();
        }
        result
    }

    /// Close the queue: further sends fail and idle takes return
    /// `Disconnected` once the remaining items are gone.
    pub fn close(&self) {
        self.closed.cancel_with_reason(CancellationReason::Shutdown);
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of queued items (approximate under concurrency)
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Non-blocking emptiness check
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Capacity of a bounded queue, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Wait up to `timeout` for the queue to become empty.
    ///
    /// Woken by the take that empties the queue. Returns whether the queue
    /// is empty.
    pub fn wait_until_empty_for(&self, timeout: Duration) -> bool {
        let mut guard = self.drain_lock.lock();
        if !self.receiver.is_empty() {
            self.drained.wait_for(&mut guard, timeout);
        }
        self.receiver.is_empty()
    }

    fn notify_if_drained(&self) {
        if self.receiver.is_empty() {
            let _guard = self.drain_lock.lock();
            self.drained.notify_all();
        }
    }
}
