//! Blocking latch over readiness events

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use globalmem_core::{Readiness, ReadinessHook};

use crate::wait::lock;

/// Collects readiness events of interest until a thread takes them
///
/// Events outside the interest mask are ignored. Pending events accumulate
/// until `wait` or `try_take` returns them.
pub struct ReadinessLatch {
    interest: Readiness,
    pending: Mutex<Readiness>,
    cond: Condvar,
}

impl ReadinessLatch {
    pub fn new(interest: Readiness) -> Self {
        Self {
            interest,
            pending: Mutex::new(Readiness::EMPTY),
            cond: Condvar::new(),
        }
    }

    /// Latch interested in both directions
    pub fn any() -> Self {
        Self::new(Readiness::READABLE | Readiness::WRITABLE)
    }

    pub fn interest(&self) -> Readiness {
        self.interest
    }

    /// Take pending events without waiting
    pub fn try_take(&self) -> Option<Readiness> {
        let mut pending = lock(&self.pending);
        take(&mut pending)
    }

    /// Wait for an event, up to `timeout` if given
    ///
    /// Returns `None` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<Readiness> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut pending = lock(&self.pending);

        loop {
            if let Some(events) = take(&mut pending) {
                return Some(events);
            }
            match deadline {
                None => {
                    pending = self
                        .cond
                        .wait(pending)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (guard, _) = self
                        .cond
                        .wait_timeout(pending, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    pending = guard;
                }
            }
        }
    }
}

fn take(pending: &mut Readiness) -> Option<Readiness> {
    if pending.is_empty() {
        None
    } else {
        Some(std::mem::take(pending))
    }
}

impl ReadinessHook for ReadinessLatch {
    fn on_ready(&self, event: Readiness) {
        let event = event.intersection(self.interest);
        if event.is_empty() {
            return;
        }
        *lock(&self.pending) |= event;
        self.cond.notify_all();
    }
}

impl std::fmt::Debug for ReadinessLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessLatch")
            .field("interest", &self.interest)
            .field("pending", &*lock(&self.pending))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ignores_uninterested_events() {
        let latch = ReadinessLatch::new(Readiness::READABLE);
        latch.on_ready(Readiness::WRITABLE);
        assert_eq!(latch.try_take(), None);

        latch.on_ready(Readiness::READABLE | Readiness::WRITABLE);
        assert_eq!(latch.try_take(), Some(Readiness::READABLE));
        assert_eq!(latch.try_take(), None);
    }

    #[test]
    fn test_events_accumulate() {
        let latch = ReadinessLatch::any();
        latch.on_ready(Readiness::READABLE);
        latch.on_ready(Readiness::WRITABLE);
        assert_eq!(latch.wait(None), Some(Readiness::READABLE | Readiness::WRITABLE));
    }

    #[test]
    fn test_wait_timeout() {
        let latch = ReadinessLatch::any();
        let start = Instant::now();
        assert_eq!(latch.wait(Some(Duration::from_millis(30))), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_wait_woken_from_other_thread() {
        let latch = Arc::new(ReadinessLatch::any());
        let latch2 = Arc::clone(&latch);

        let waiter = thread::spawn(move || latch2.wait(Some(Duration::from_secs(5))));
        thread::sleep(Duration::from_millis(20));
        latch.on_ready(Readiness::WRITABLE);

        assert_eq!(waiter.join().unwrap(), Some(Readiness::WRITABLE));
    }
}
