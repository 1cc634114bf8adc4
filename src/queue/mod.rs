//! The plant's work queue
//!
//! [`WorkQueue`] is a FIFO, multi-producer multi-consumer queue built on
//! crossbeam channels. On top of the channel it adds the three things the
//! plant's shutdown protocol needs:
//!
//! - takes that can be cut short by a [`CancellationToken`]
//! - a `close()` that wakes idle consumers once nothing is left
//! - [`WorkQueue::wait_until_empty_for`], a condition-variable wait that is
//!   notified whenever a take leaves the queue empty
//!
//! [`CancellationToken`]: crate::core::CancellationToken

mod work_queue;

pub use work_queue::WorkQueue;

/// Error returned when an item cannot be enqueued; the item is handed back
#[derive(Debug, PartialEq, Eq)]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Recover the item that could not be sent
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("work queue is closed")
    }
}

impl<T: std::fmt::Debug> std::error::Error for SendError<T> {}

/// Error returned by a take that produced no item
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// Nothing arrived within the timeout
    #[error("no item arrived before the timeout")]
    Empty,
    /// The queue is closed and has been drained
    #[error("work queue is closed and empty")]
    Disconnected,
    /// The waiting thread was cancelled
    #[error("take was cancelled")]
    Cancelled,
}
