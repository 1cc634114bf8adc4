//! Cooperative cancellation for producer and worker threads
//!
//! A [`CancellationToken`] is a shared flag plus a wakeup signal. Threads
//! blocked in [`CancellationToken::sleep`] or selecting on
//! [`CancellationToken::cancelled`] are released the moment the token is
//! cancelled, so stage delays and queue takes never have to poll.
//!
//! # Example
//!
//! ```rust
//! use bottling_plant::CancellationToken;
//! use std::thread;
//! use std::time::Duration;
//!
//! let token = CancellationToken::new();
//! let sleeper = token.clone();
//!
//! let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
//!
//! token.cancel();
//! assert!(handle.join().unwrap().is_err());
//! ```

use crate::core::{PlantError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via `cancel()`
    Manual,
    /// The plant is stopping production
    Shutdown,
    /// Workers were force-cancelled after the grace period expired
    GracePeriodExpired(Duration),
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::Shutdown => write!(f, "plant shutting down"),
            CancellationReason::GracePeriodExpired(d) => {
                write!(f, "grace period of {:?} expired", d)
            }
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    reason: RwLock<Option<CancellationReason>>,
    // Dropping the sender disconnects every clone of the receiver, which is
    // what wakes blocked sleepers and selects.
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

/// A thread-safe cancellation token shared between a controller and the
/// threads it may need to interrupt
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(CancellationTokenInner {
                cancelled: AtomicBool::new(false),
                reason: RwLock::new(None),
                wake_tx: Mutex::new(Some(wake_tx)),
                wake_rx,
            }),
        }
    }

    /// Cancel this token with default reason (Manual)
    ///
    /// Idempotent: only the first call records a reason.
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token with a specific reason and wake every waiter
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.inner.reason.write() = Some(reason);
        self.inner.wake_tx.lock().take();
    }

    /// Check if this token has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the cancellation reason (if cancelled)
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Returns `InterruptedWait` if cancelled, `Ok(())` otherwise
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(self.interrupted_error("cancellation check"))
        } else {
            Ok(())
        }
    }

    /// Block for `duration` unless the token is cancelled first
    ///
    /// # Errors
    ///
    /// Returns `PlantError::InterruptedWait` if the token was (or becomes)
    /// cancelled before the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        match self.inner.wake_rx.recv_timeout(duration) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(self.interrupted_error("sleep")),
        }
    }

    /// Receiver that becomes disconnected once the token is cancelled
    ///
    /// Intended for `crossbeam_channel::select!` alongside another blocking
    /// operation.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.inner.wake_rx
    }

    fn interrupted_error(&self, what: &str) -> PlantError {
        let reason = self
            .reason()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        PlantError::interrupted(format!("{} ({})", what, reason))
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());

        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Manual));

        // Idempotent, first reason wins
        token.cancel_with_reason(CancellationReason::Shutdown);
        assert_eq!(token.reason(), Some(CancellationReason::Manual));
    }

    #[test]
    fn test_clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel_with_reason(CancellationReason::Shutdown);
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Shutdown));
    }

    #[test]
    fn test_sleep_completes_when_not_cancelled() {
        let token = CancellationToken::new();
        let start = Instant::now();
        token
            .sleep(Duration::from_millis(20))
            .expect("sleep should complete");
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_interrupted_by_cancel() {
        let token = CancellationToken::new();
        let sleeper = token.clone();

        let start = Instant::now();
        let handle = thread::spawn(move || sleeper.sleep(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(20));
        token.cancel_with_reason(CancellationReason::GracePeriodExpired(
            Duration::from_millis(20),
        ));

        let result = handle.join().expect("sleeper panicked");
        assert!(matches!(result, Err(PlantError::InterruptedWait { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_after_cancel_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let start = Instant::now();
        assert!(token.sleep(Duration::from_secs(10)).is_err());
        assert!(token.sleep(Duration::ZERO).is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_check() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel_with_reason(CancellationReason::Custom("lunch break".to_string()));

        let err = token.check().unwrap_err();
        assert!(err.to_string().contains("lunch break"));
    }

    #[test]
    fn test_cancelled_receiver_in_select() {
        let token = CancellationToken::new();
        let (_tx, rx) = crossbeam_channel::unbounded::<u32>();

        let waiter = token.clone();
        let handle = thread::spawn(move || {
            crossbeam_channel::select! {
                recv(rx) -> _ => "item",
                recv(waiter.cancelled()) -> _ => "cancelled",
            }
        });

        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert_eq!(handle.join().expect("waiter panicked"), "cancelled");
    }
}
