//! Readiness set and readiness hook
//!
//! A device is readable while it holds at least one byte and writable while
//! it has room for at least one more. Hooks are told whenever a transfer
//! makes one of those newly true.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// Set of readiness bits
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Readiness(u8);

impl Readiness {
    /// Neither readable nor writable
    pub const EMPTY: Readiness = Readiness(0);
    /// At least one byte can be read without blocking
    pub const READABLE: Readiness = Readiness(0b01);
    /// At least one byte can be written without blocking
    pub const WRITABLE: Readiness = Readiness(0b10);

    /// Readiness of a buffer holding `len` of `capacity` bytes
    #[inline]
    pub fn of(len: usize, capacity: usize) -> Self {
        let mut r = Readiness::EMPTY;
        if len > 0 {
            r |= Readiness::READABLE;
        }
        if len < capacity {
            r |= Readiness::WRITABLE;
        }
        r
    }

    #[inline]
    pub fn is_readable(self) -> bool {
        self.contains(Readiness::READABLE)
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        self.contains(Readiness::WRITABLE)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn contains(self, other: Readiness) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bits present in both sets
    #[inline]
    pub fn intersection(self, other: Readiness) -> Readiness {
        Readiness(self.0 & other.0)
    }

    /// Bits of `self` not present in `other`
    #[inline]
    pub fn difference(self, other: Readiness) -> Readiness {
        Readiness(self.0 & !other.0)
    }

    /// Translate to a `poll(2)` revents mask
    #[cfg(unix)]
    pub fn to_poll_events(self) -> libc::c_short {
        let mut events: libc::c_short = 0;
        if self.is_readable() {
            events |= libc::POLLIN | libc::POLLRDNORM;
        }
        if self.is_writable() {
            events |= libc::POLLOUT | libc::POLLWRNORM;
        }
        events
    }

    /// Translate from a `poll(2)` events mask
    #[cfg(unix)]
    pub fn from_poll_events(events: libc::c_short) -> Self {
        let mut r = Readiness::EMPTY;
        if events & (libc::POLLIN | libc::POLLRDNORM) != 0 {
            r |= Readiness::READABLE;
        }
        if events & (libc::POLLOUT | libc::POLLWRNORM) != 0 {
            r |= Readiness::WRITABLE;
        }
        r
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    #[inline]
    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    #[inline]
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => write!(f, "Readiness(READABLE | WRITABLE)"),
            (true, false) => write!(f, "Readiness(READABLE)"),
            (false, true) => write!(f, "Readiness(WRITABLE)"),
            (false, false) => write!(f, "Readiness(EMPTY)"),
        }
    }
}

/// Observer told about readiness transitions
///
/// Invoked synchronously on the thread that performed the transfer, after
/// the device lock is released. Delivery to anything further away (a
/// signal, an event loop) is up to the implementor.
///
/// **Contract:**
/// - `on_ready()` must not block.
/// - It may call back into the device (including unsubscribing itself).
pub trait ReadinessHook: Send + Sync {
    /// `event` holds the bit(s) the transfer made true
    fn on_ready(&self, event: Readiness);
}

impl<F> ReadinessHook for F
where
    F: Fn(Readiness) + Send + Sync,
{
    fn on_ready(&self, event: Readiness) {
        self(event)
    }
}
