//! Access coordinator
//!
//! Owns the store lock and the two wait queues, and implements the
//! blocking/non-blocking read and write protocols, bounded seeking and
//! clear.
//!
//! # Protocol
//!
//! ```text
//! Start ─▶ CheckReady ──ready──────────────▶ Proceed
//!              │  ▲
//!              │  └──woken───┐
//!              ├─non-blocking┼─────────────▶ Fail(WouldBlock)
//!              └─blocking─▶ Wait ─cancel───▶ Fail(Interrupted)
//! ```
//!
//! The store lock is held from `CheckReady` to the end of the copy and is
//! released atomically while waiting. After a transfer the opposite queue
//! is woken with the lock released. Readiness hooks run only on a
//! transition: a write into an empty buffer, or a read from a full one.

use std::sync::{Arc, Mutex, MutexGuard};

use globalmem_core::{
    kdebug, kinfo, kwarn, CancelWaker, MemError, MemResult, Readiness, ReadinessHook, UserBuf,
    UserBufMut,
};

use crate::config::DeviceConfig;
use crate::handle::Handle;
use crate::hooks::{HookId, HookRegistry};
use crate::store::BufferStore;
use crate::wait::{lock, WaitQueue};

/// Origin of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Offset is absolute
    FromStart,
    /// Offset is relative to the handle's position
    FromCurrent,
    /// Offset is relative to the end (not supported by the device)
    FromEnd,
}

impl Whence {
    /// Decode a `lseek(2)` whence value
    #[cfg(unix)]
    pub fn from_raw(whence: i32) -> MemResult<Self> {
        match whence {
            libc::SEEK_SET => Ok(Whence::FromStart),
            libc::SEEK_CUR => Ok(Whence::FromCurrent),
            libc::SEEK_END => Ok(Whence::FromEnd),
            _ => Err(MemError::InvalidArgument),
        }
    }
}

/// Which side of the buffer a caller waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Waits for content
    Read,
    /// Waits for space
    Write,
}

impl Direction {
    #[inline]
    fn ready(self, store: &BufferStore) -> bool {
        match self {
            Direction::Read => !store.is_empty(),
            Direction::Write => !store.is_full(),
        }
    }
}

/// State shared with cancellation wakers
struct Shared {
    store: Mutex<BufferStore>,

    /// Readers waiting for content
    readable: WaitQueue,

    /// Writers waiting for space
    writable: WaitQueue,
}

impl Shared {
    #[inline]
    fn queue(&self, direction: Direction) -> &WaitQueue {
        match direction {
            Direction::Read => &self.readable,
            Direction::Write => &self.writable,
        }
    }
}

/// Rouses the sleepers of one queue when a waiting caller's token fires
struct Interrupter {
    shared: Arc<Shared>,
    direction: Direction,
}

impl CancelWaker for Interrupter {
    fn wake(&self) {
        // A sleeper checks its token with the store lock held, so taking the
        // lock here orders this wake after it is really asleep.
        drop(lock(&self.shared.store));
        self.shared.queue(self.direction).wake_everyone();
    }
}

/// Serializes access to one shared buffer
pub struct AccessCoordinator {
    shared: Arc<Shared>,
    hooks: HookRegistry,
    capacity: usize,
    name: String,
}

impl AccessCoordinator {
    pub(crate) fn new(config: &DeviceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(BufferStore::new(config.capacity)),
                readable: WaitQueue::new(config.wake_all),
                writable: WaitQueue::new(config.wake_all),
            }),
            hooks: HookRegistry::new(),
            capacity: config.capacity,
            name: config.name.clone(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered (snapshot)
    pub fn len(&self) -> usize {
        lock(&self.shared.store).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.user_len()` bytes from the front of the buffer
    ///
    /// Returns 0 without touching the buffer once the handle sits at the
    /// end of the range. Otherwise blocks (or fails with `WouldBlock`) while
    /// the buffer is empty, then consumes `min(requested, buffered)` bytes.
    pub fn read<B: UserBufMut + ?Sized>(&self, handle: &Handle, buf: &mut B) -> MemResult<usize> {
        if handle.position() >= self.capacity {
            return Ok(0);
        }

        let mut store = self.wait_ready(Direction::Read, handle)?;
        let was_full = store.is_full();
        let n = buf.user_len().min(store.len());
        if let Err(e) = store.consume_with(n, |src| buf.copy_to_user(src)) {
            kwarn!("{}: read fault copying {} byte(s) to handle {}", self.name, n, handle.id());
            return Err(e.into());
        }
        let remaining = store.len();
        drop(store);

        kdebug!("{}: read {} byte(s), current_len:{}", self.name, n, remaining);
        if n > 0 {
            self.shared.writable.wake();
            if remaining > 0 {
                // Content left over for another reader
                self.shared.readable.wake();
            }
            if was_full {
                self.hooks.notify(Readiness::WRITABLE);
            }
        }
        Ok(n)
    }

    /// Append up to `buf.user_len()` bytes after the buffered content
    ///
    /// The request is first clamped to `capacity - position`, then to the
    /// free space once the buffer has room. Blocks (or fails with
    /// `WouldBlock`) while the buffer is full.
    pub fn write<B: UserBuf + ?Sized>(&self, handle: &Handle, buf: &B) -> MemResult<usize> {
        let position = handle.position();
        if position >= self.capacity {
            return Ok(0);
        }
        let requested = buf.user_len().min(self.capacity - position);

        let mut store = self.wait_ready(Direction::Write, handle)?;
        let was_empty = store.is_empty();
        let n = requested.min(store.space());
        if let Err(e) = store.append_with(n, |dst| buf.copy_from_user(dst)) {
            kwarn!("{}: write fault copying {} byte(s) from handle {}", self.name, n, handle.id());
            return Err(e.into());
        }
        let length = store.len();
        let has_space = !store.is_full();
        drop(store);

        kdebug!("{}: written {} byte(s), current_len:{}", self.name, n, length);
        if n > 0 {
            self.shared.readable.wake();
            if has_space {
                // Space left over for another writer
                self.shared.writable.wake();
            }
            if was_empty {
                self.hooks.notify(Readiness::READABLE);
            }
        }
        Ok(n)
    }

    /// Move the handle's cursor
    ///
    /// Positions outside `[0, capacity]` and `FromEnd` fail with
    /// `InvalidArgument`. Never touches the store lock.
    pub fn seek(&self, handle: &mut Handle, offset: i64, whence: Whence) -> MemResult<u64> {
        let base: i128 = match whence {
            Whence::FromStart => 0,
            Whence::FromCurrent => handle.position() as i128,
            Whence::FromEnd => {
                kdebug!("{}: seek from end rejected", self.name);
                return Err(MemError::InvalidArgument);
            }
        };
        let target = base + offset as i128;
        if target < 0 || target > self.capacity as i128 {
            kdebug!("{}: seek to {} out of range 0..={}", self.name, target, self.capacity);
            return Err(MemError::InvalidArgument);
        }
        handle.set_position(target as usize);
        Ok(target as u64)
    }

    /// Zero every byte of the buffer
    ///
    /// The buffered length is kept, so pending content reads back as zeros.
    /// Never blocks and wakes nobody.
    pub fn clear(&self, handle: &Handle) -> MemResult<()> {
        lock(&self.shared.store).clear();
        kinfo!("{}: cleared by handle {}", self.name, handle.id());
        Ok(())
    }

    /// Current readiness of the buffer
    pub fn poll(&self) -> Readiness {
        let store = lock(&self.shared.store);
        Readiness::of(store.len(), store.capacity())
    }

    /// Register a readiness hook
    pub fn subscribe(&self, hook: Arc<dyn ReadinessHook>) -> HookId {
        self.hooks.subscribe(hook)
    }

    /// Remove a readiness hook; returns false if it was not registered
    pub fn unsubscribe(&self, id: HookId) -> bool {
        self.hooks.unsubscribe(id)
    }

    /// Number of registered hooks
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Readers currently blocked (hint)
    pub fn blocked_readers(&self) -> usize {
        self.shared.readable.waiting()
    }

    /// Writers currently blocked (hint)
    pub fn blocked_writers(&self) -> usize {
        self.shared.writable.waiting()
    }

    /// Lock the store and wait until `direction` can proceed
    ///
    /// Returns with the lock held and the predicate true.
    fn wait_ready(&self, direction: Direction, handle: &Handle) -> MemResult<MutexGuard<'_, BufferStore>> {
        let mut store = lock(&self.shared.store);
        if direction.ready(&store) {
            return Ok(store);
        }
        if !handle.is_blocking() {
            return Err(MemError::WouldBlock);
        }

        let token = handle.cancellation();
        let queue = self.shared.queue(direction);
        let _registration = token.register(Arc::new(Interrupter {
            shared: Arc::clone(&self.shared),
            direction,
        }));

        loop {
            if token.is_cancelled() {
                // A wake meant for this caller may have been spent here
                let pass_on = direction.ready(&store);
                drop(store);
                if pass_on {
                    queue.wake();
                }
                kdebug!("{}: {:?} wait interrupted on handle {}", self.name, direction, handle.id());
                return Err(MemError::Interrupted);
            }

            store = queue.sleep(store);
            if direction.ready(&store) {
                return Ok(store);
            }
        }
    }
}

impl std::fmt::Debug for AccessCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCoordinator")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("length", &self.len())
            .finish()
    }
}
