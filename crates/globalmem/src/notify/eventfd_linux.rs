//! eventfd-backed readiness hook
//!
//! Each readiness event adds 1 to the eventfd counter, so any number of
//! events before the consumer reads collapse into one wakeup. Register the
//! fd with epoll/poll for `POLLIN`, then call `drain` and `Handle::poll` to
//! find out what changed.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use globalmem_core::{kwarn, Readiness, ReadinessHook};

pub struct EventFdHook {
    fd: OwnedFd,
    interest: Readiness,
}

impl EventFdHook {
    /// Create a new non-blocking eventfd signalled on any readiness event
    pub fn new() -> io::Result<Self> {
        Self::with_interest(Readiness::READABLE | Readiness::WRITABLE)
    }

    /// Create a new eventfd signalled only for events in `interest`
    pub fn with_interest(interest: Readiness) -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: eventfd returned a fresh descriptor nobody else owns
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd, interest })
    }

    /// Raw descriptor, for epoll/poll registration
    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Reset the counter; returns the number of events since the last drain
    pub fn drain(&self) -> io::Result<u64> {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(val)
    }
}

impl AsRawFd for EventFdHook {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl ReadinessHook for EventFdHook {
    fn on_ready(&self, event: Readiness) {
        if event.intersection(self.interest).is_empty() {
            return;
        }
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // EAGAIN: counter saturated, a wakeup is already pending
            if err.raw_os_error() != Some(libc::EAGAIN) {
                kwarn!("eventfd {} signal failed: {}", self.fd.as_raw_fd(), err);
            }
        }
    }
}

impl std::fmt::Debug for EventFdHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFdHook")
            .field("fd", &self.fd.as_raw_fd())
            .field("interest", &self.interest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readable_now(fd: RawFd) -> bool {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, 0) };
        ret == 1 && pfd.revents & libc::POLLIN != 0
    }

    #[test]
    fn test_events_coalesce() {
        let hook = EventFdHook::new().unwrap();
        assert!(hook.fd() >= 0);
        assert!(!readable_now(hook.fd()));

        hook.on_ready(Readiness::READABLE);
        hook.on_ready(Readiness::WRITABLE);
        assert!(readable_now(hook.fd()));

        assert_eq!(hook.drain().unwrap(), 2);
        assert!(!readable_now(hook.fd()));
        assert_eq!(hook.drain().unwrap(), 0);
    }

    #[test]
    fn test_interest_filter() {
        let hook = EventFdHook::with_interest(Readiness::READABLE).unwrap();
        hook.on_ready(Readiness::WRITABLE);
        assert_eq!(hook.drain().unwrap(), 0);
        hook.on_ready(Readiness::READABLE);
        assert_eq!(hook.drain().unwrap(), 1);
    }
}
