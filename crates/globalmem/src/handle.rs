//! Open sessions on a device
//!
//! A `Handle` is what `open` hands out: a private cursor and blocking mode
//! plus a shared reference to the device. All handles on one device see and
//! drain the same bytes.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use globalmem_core::{
    kdebug, CancellationToken, ControlCommand, MemResult, Readiness, ReadinessHook, UserBuf,
    UserBufMut,
};

use crate::coordinator::Whence;
use crate::device::Device;
use crate::hooks::HookId;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Options for opening a handle
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    nonblocking: bool,
    cancellation: Option<CancellationToken>,
}

impl OpenOptions {
    /// Blocking handle with its own cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from `open(2)` flags (`O_NONBLOCK`)
    #[cfg(unix)]
    pub fn from_flags(flags: i32) -> Self {
        Self::new().nonblocking(flags & libc::O_NONBLOCK != 0)
    }

    /// Fail with `WouldBlock` instead of waiting
    pub fn nonblocking(mut self, enable: bool) -> Self {
        self.nonblocking = enable;
        self
    }

    /// Token that interrupts this handle's blocking calls
    ///
    /// Without one the handle gets a fresh token, reachable through
    /// `Handle::cancellation()`.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// An open session on a device
pub struct Handle {
    device: Arc<Device>,
    id: u64,
    position: usize,
    blocking: bool,
    cancellation: CancellationToken,
    async_hook: Option<HookId>,
}

impl Handle {
    pub(crate) fn new(device: Arc<Device>, options: OpenOptions) -> Self {
        Self {
            device,
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            position: 0,
            blocking: !options.nonblocking,
            cancellation: options.cancellation.unwrap_or_default(),
            async_hook: None,
        }
    }

    /// Process-unique handle id, used in log lines
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Token whose cancellation interrupts this handle's waits
    ///
    /// Clone it before blocking to interrupt the call from another thread.
    #[inline]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Consume up to `buf.user_len()` buffered bytes
    pub fn read<B: UserBufMut + ?Sized>(&self, buf: &mut B) -> MemResult<usize> {
        self.device.coordinator().read(self, buf)
    }

    /// Append up to `buf.user_len()` bytes
    pub fn write<B: UserBuf + ?Sized>(&self, buf: &B) -> MemResult<usize> {
        self.device.coordinator().write(self, buf)
    }

    /// Move the cursor; returns the new position
    pub fn llseek(&mut self, offset: i64, whence: Whence) -> MemResult<u64> {
        let device = Arc::clone(&self.device);
        device.coordinator().seek(self, offset, whence)
    }

    /// Zero the buffer
    pub fn clear(&self) -> MemResult<()> {
        self.device.coordinator().clear(self)
    }

    /// Run a raw control request
    pub fn control(&self, code: u32) -> MemResult<()> {
        match ControlCommand::from_code(code) {
            Ok(ControlCommand::Clear) => self.clear(),
            Err(e) => {
                kdebug!("{}: unknown control code {:#x}", self.device.name(), code);
                Err(e)
            }
        }
    }

    /// Current readiness of the shared buffer
    pub fn poll(&self) -> Readiness {
        self.device.coordinator().poll()
    }

    /// Register (or with `None`, drop) this handle's async readiness hook
    ///
    /// At most one per handle; a new registration replaces the old one.
    /// The hook is removed when the handle closes.
    pub fn set_async(&mut self, hook: Option<Arc<dyn ReadinessHook>>) {
        if let Some(old) = self.async_hook.take() {
            self.device.unsubscribe(old);
        }
        self.async_hook = hook.map(|hook| self.device.subscribe(hook));
    }

    /// Whether an async readiness hook is registered
    pub fn has_async(&self) -> bool {
        self.async_hook.is_some()
    }

    /// Close the handle
    ///
    /// Same as dropping it. The device and other handles are unaffected.
    pub fn close(self) {}
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(id) = self.async_hook.take() {
            self.device.unsubscribe(id);
        }
        self.device.release();
        kdebug!("{}: handle {} closed", self.device.name(), self.id);
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("device", &self.device.name())
            .field("position", &self.position)
            .field("blocking", &self.blocking)
            .finish()
    }
}

impl io::Read for Handle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Handle::read(self, buf)?)
    }
}

impl io::Write for Handle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Handle::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for Handle {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| io::Error::from(globalmem_core::MemError::InvalidArgument))?,
                Whence::FromStart,
            ),
            io::SeekFrom::Current(n) => (n, Whence::FromCurrent),
            io::SeekFrom::End(n) => (n, Whence::FromEnd),
        };
        Ok(self.llseek(offset, whence)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use globalmem_core::{MemError, MEM_CLEAR};
    use std::io::{Read, Seek, SeekFrom, Write};

    fn device(capacity: usize) -> Arc<Device> {
        Device::new(DeviceConfig::new().name("handle-test").capacity(capacity)).unwrap()
    }

    #[test]
    fn test_open_defaults() {
        let dev = device(32);
        let h = dev.open(OpenOptions::new());
        assert!(h.is_blocking());
        assert_eq!(h.position(), 0);
        assert!(!h.cancellation().is_cancelled());

        let nb = dev.open(OpenOptions::new().nonblocking(true));
        assert!(!nb.is_blocking());
        assert_ne!(h.id(), nb.id());
    }

    #[cfg(unix)]
    #[test]
    fn test_open_from_flags() {
        assert!(!OpenOptions::from_flags(libc::O_RDWR).nonblocking);
        assert!(OpenOptions::from_flags(libc::O_RDONLY | libc::O_NONBLOCK).nonblocking);
    }

    #[test]
    fn test_io_traits() {
        let dev = device(32);
        let mut h = dev.open(OpenOptions::new().nonblocking(true));

        assert_eq!(Write::write(&mut h, b"stream").unwrap(), 6);
        let mut out = [0u8; 16];
        assert_eq!(Read::read(&mut h, &mut out).unwrap(), 6);
        assert_eq!(&out[..6], b"stream");

        let err = Read::read(&mut h, &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_read_to_end_stops_on_cancel() {
        let dev = device(8);
        let mut h = dev.open(OpenOptions::new());
        let token = h.cancellation().clone();

        let blocked = std::thread::spawn(move || {
            let mut sink = Vec::new();
            let result = h.read_to_end(&mut sink);
            (result, sink)
        });

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while dev.coordinator().blocked_readers() == 0 {
            assert!(std::time::Instant::now() < deadline, "reader never blocked");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        token.cancel();

        let (result, sink) = blocked.join().unwrap();
        let err = result.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(
            err.get_ref().and_then(|e| e.downcast_ref::<MemError>()),
            Some(&MemError::Interrupted)
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_io_seek() {
        let dev = device(32);
        let mut h = dev.open(OpenOptions::new());

        assert_eq!(h.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(h.seek(SeekFrom::Current(-4)).unwrap(), 6);
        assert_eq!(h.seek(SeekFrom::End(0)).unwrap_err().kind(), io::ErrorKind::InvalidInput);
        assert_eq!(h.seek(SeekFrom::Start(u64::MAX)).unwrap_err().kind(), io::ErrorKind::InvalidInput);
        assert_eq!(h.position(), 6);
    }

    #[test]
    fn test_control_codes() {
        let dev = device(8);
        let h = dev.open(OpenOptions::new().nonblocking(true));
        h.write(b"abc").unwrap();

        h.control(MEM_CLEAR).unwrap();
        assert_eq!(h.control(MEM_CLEAR ^ 0xff), Err(MemError::InvalidArgument));

        let mut out = [0xffu8; 3];
        assert_eq!(h.read(&mut out).unwrap(), 3);
        assert_eq!(out, [0, 0, 0]);
    }

    #[test]
    fn test_set_async_replaces_and_drops() {
        let dev = device(8);
        let mut h = dev.open(OpenOptions::new());

        h.set_async(Some(Arc::new(|_: Readiness| {})));
        h.set_async(Some(Arc::new(|_: Readiness| {})));
        assert!(h.has_async());
        assert_eq!(dev.coordinator().hook_count(), 1);

        h.set_async(None);
        assert_eq!(dev.coordinator().hook_count(), 0);

        h.set_async(Some(Arc::new(|_: Readiness| {})));
        drop(h);
        assert_eq!(dev.coordinator().hook_count(), 0);
    }

    #[test]
    fn test_close_keeps_device_content() {
        let dev = device(8);
        let writer = dev.open(OpenOptions::new());
        writer.write(b"kept").unwrap();
        writer.close();

        assert_eq!(dev.open_handles(), 0);
        let reader = dev.open(OpenOptions::new().nonblocking(true));
        let mut out = [0u8; 8];
        assert_eq!(reader.read(&mut out).unwrap(), 4);
        assert_eq!(&out[..4], b"kept");
    }
}
