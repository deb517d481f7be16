//! Cancellation token for cooperative cancellation
//!
//! A reader or writer blocked on the device passes its token into the wait.
//! Cancelling the token wakes every wait it is registered with, and the
//! blocked call returns `Err(MemError::Interrupted)` without doing any work.
//!
//! Waits register a `CancelWaker` for the duration of the sleep. `cancel()`
//! snapshots the registered wakers and runs them after releasing the
//! registry lock, so a waker is free to take the lock its waiter sleeps on.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use crate::error::{MemError, MemResult};
use crate::spinlock::SpinLock;

/// Something that can rouse a sleeping waiter
///
/// Implementors must not block for long: `wake` runs on the thread that
/// called `cancel()`.
pub trait CancelWaker: Send + Sync {
    /// Wake the waiter(s) this registration stands for
    fn wake(&self);
}

/// Token for checking and triggering cancellation
///
/// Clones share state: cancelling any clone cancels all of them. A handle
/// opened on the device carries one token, and every blocking read or
/// write made through that handle observes it.
#[derive(Clone)]
pub struct CancellationToken {
    inner: CancellationInner,
}

#[derive(Clone)]
enum CancellationInner {
    /// Heap-allocated shared state
    Owned(Arc<OwnedCancellation>),
    /// Token that never cancels
    Never,
}

struct OwnedCancellation {
    /// Cancellation flag
    cancelled: AtomicBool,

    /// Wakers of waits currently sleeping on this token
    wakers: SpinLock<Vec<(u64, Arc<dyn CancelWaker>)>>,

    /// Next registration id
    next_id: AtomicU64,
}

impl CancellationToken {
    /// Create a new independent cancellation token
    pub fn new() -> Self {
        Self {
            inner: CancellationInner::Owned(Arc::new(OwnedCancellation {
                cancelled: AtomicBool::new(false),
                wakers: SpinLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            })),
        }
    }

    /// Create a token that never cancels
    ///
    /// Does not allocate. Waits using it can only end when the predicate
    /// they wait for becomes true.
    pub const fn never() -> Self {
        Self {
            inner: CancellationInner::Never,
        }
    }

    /// Check if cancellation was requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match &self.inner {
            CancellationInner::Owned(arc) => arc.cancelled.load(Ordering::Acquire),
            CancellationInner::Never => false,
        }
    }

    /// Request cancellation and wake every registered wait
    pub fn cancel(&self) {
        let CancellationInner::Owned(arc) = &self.inner else {
            return;
        };
        arc.cancelled.store(true, Ordering::Release);

        // Wake outside the registry lock
        let wakers: Vec<Arc<dyn CancelWaker>> = arc
            .wakers
            .lock()
            .iter()
            .map(|(_, waker)| Arc::clone(waker))
            .collect();
        for waker in wakers {
            waker.wake();
        }
    }

    /// Check if cancelled and return error if so
    ///
    /// ```ignore
    /// token.check()?; // Err(MemError::Interrupted) once cancelled
    /// ```
    #[inline]
    pub fn check(&self) -> MemResult<()> {
        if self.is_cancelled() {
            Err(MemError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Reset cancellation so the token can be reused
    ///
    /// Waits already interrupted stay interrupted.
    pub fn reset(&self) {
        if let CancellationInner::Owned(arc) = &self.inner {
            arc.cancelled.store(false, Ordering::Release);
        }
    }

    /// Register a waker for the lifetime of the returned guard
    ///
    /// Register first, then check `is_cancelled()`: either the check sees
    /// the flag or `cancel()` sees the waker.
    pub fn register(&self, waker: Arc<dyn CancelWaker>) -> CancelRegistration {
        match &self.inner {
            CancellationInner::Owned(arc) => {
                let id = arc.next_id.fetch_add(1, Ordering::Relaxed);
                arc.wakers.lock().push((id, waker));
                CancelRegistration {
                    owner: Some(Arc::clone(arc)),
                    id,
                }
            }
            CancellationInner::Never => CancelRegistration { owner: None, id: 0 },
        }
    }

    /// Number of waits currently registered (hint, may be stale)
    pub fn registered_count(&self) -> usize {
        match &self.inner {
            CancellationInner::Owned(arc) => arc.wakers.lock().len(),
            CancellationInner::Never => 0,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Guard that removes a waker registration when dropped
#[must_use = "the waker is unregistered as soon as the guard is dropped"]
pub struct CancelRegistration {
    owner: Option<Arc<OwnedCancellation>>,
    id: u64,
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.wakers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingWaker(AtomicUsize);

    impl CancelWaker for CountingWaker {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_basic_cancellation() {
        let token = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(MemError::Interrupted)));
    }

    #[test]
    fn test_reset() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        let token = CancellationToken::never();
        assert!(!token.is_cancelled());
        token.cancel(); // no-op
        assert!(!token.is_cancelled());
        assert_eq!(token.registered_count(), 0);
    }

    #[test]
    fn test_cancel_runs_registered_wakers() {
        let token = CancellationToken::new();
        let waker = Arc::new(CountingWaker(AtomicUsize::new(0)));

        let registration = token.register(waker.clone());
        assert_eq!(token.registered_count(), 1);

        token.cancel();
        assert_eq!(waker.0.load(Ordering::SeqCst), 1);

        drop(registration);
        assert_eq!(token.registered_count(), 0);
    }

    #[test]
    fn test_dropped_registration_is_not_woken() {
        let token = CancellationToken::new();
        let waker = Arc::new(CountingWaker(AtomicUsize::new(0)));

        drop(token.register(waker.clone()));
        token.cancel();

        assert_eq!(waker.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_waker_may_register_during_cancel() {
        // A waker that touches the registry must not deadlock cancel()
        struct Reentrant(CancellationToken);
        impl CancelWaker for Reentrant {
            fn wake(&self) {
                assert!(self.0.registered_count() >= 1);
            }
        }

        let token = CancellationToken::new();
        let _registration = token.register(Arc::new(Reentrant(token.clone())));
        token.cancel();
    }
}
