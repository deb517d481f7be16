//! Wait queues for blocked readers and writers
//!
//! A `WaitQueue` is a condition variable paired with the store mutex, plus
//! a count of sleepers so wakers can skip the notify when nobody waits.
//! Sleeping atomically releases the store lock and re-acquires it on wake;
//! callers always re-check their predicate afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked
///
/// Every mutation of the store completes before its guard can drop, so a
/// poisoned store is still consistent.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Condvar-backed queue of sleepers
pub(crate) struct WaitQueue {
    /// Condition variable, always used with the store mutex
    condvar: Condvar,

    /// Count of sleepers
    waiters: AtomicUsize,

    /// Wake every sleeper instead of one
    wake_all: bool,
}

impl WaitQueue {
    pub(crate) fn new(wake_all: bool) -> Self {
        Self {
            condvar: Condvar::new(),
            waiters: AtomicUsize::new(0),
            wake_all,
        }
    }

    /// Sleep until woken, releasing `guard` for the duration
    ///
    /// Wakeups may be spurious.
    pub(crate) fn sleep<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let guard = self
            .condvar
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner);
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        guard
    }

    /// Wake sleepers after a state change
    ///
    /// Wakes all of them or one, depending on configuration.
    pub(crate) fn wake(&self) {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        if self.wake_all {
            self.condvar.notify_all();
        } else {
            self.condvar.notify_one();
        }
    }

    /// Wake every sleeper so each re-checks its cancellation token
    pub(crate) fn wake_everyone(&self) {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        self.condvar.notify_all();
    }

    /// Number of sleepers (hint, may be stale)
    pub(crate) fn waiting(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Shared {
        flag: Mutex<bool>,
        queue: WaitQueue,
    }

    fn wait_until_sleeping(queue: &WaitQueue, n: usize) {
        for _ in 0..500 {
            if queue.waiting() >= n {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("sleepers never arrived");
    }

    #[test]
    fn test_wake_releases_sleeper() {
        let shared = Arc::new(Shared {
            flag: Mutex::new(false),
            queue: WaitQueue::new(true),
        });

        let s2 = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            let mut guard = lock(&s2.flag);
            while !*guard {
                guard = s2.queue.sleep(guard);
            }
        });

        wait_until_sleeping(&shared.queue, 1);
        *lock(&shared.flag) = true;
        shared.queue.wake();

        handle.join().unwrap();
        assert_eq!(shared.queue.waiting(), 0);
    }

    #[test]
    fn test_wake_everyone_in_wake_one_mode() {
        let shared = Arc::new(Shared {
            flag: Mutex::new(false),
            queue: WaitQueue::new(false),
        });

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let s = Arc::clone(&shared);
                thread::spawn(move || {
                    let mut guard = lock(&s.flag);
                    while !*guard {
                        guard = s.queue.sleep(guard);
                    }
                })
            })
            .collect();

        wait_until_sleeping(&shared.queue, 3);
        *lock(&shared.flag) = true;
        shared.queue.wake_everyone();

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_wake_without_sleepers_is_noop() {
        let queue = WaitQueue::new(false);
        queue.wake();
        queue.wake_everyone();
        assert_eq!(queue.waiting(), 0);
    }
}
