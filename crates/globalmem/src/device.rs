//! The device: one shared buffer and the sessions open on it

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use globalmem_core::{kdebug, kinfo, MemResult, ReadinessHook};

use crate::config::DeviceConfig;
use crate::coordinator::AccessCoordinator;
use crate::handle::{Handle, OpenOptions};
use crate::hooks::HookId;

/// A shared fixed-capacity buffer exposed through handles
///
/// The buffer is allocated zero-filled at construction and freed when the
/// last `Arc<Device>` (including those held by open handles) is dropped.
pub struct Device {
    config: DeviceConfig,
    coordinator: AccessCoordinator,
    open_handles: AtomicUsize,
}

impl Device {
    /// Create a device from a validated configuration
    pub fn new(config: DeviceConfig) -> MemResult<Arc<Self>> {
        config.validate()?;
        let coordinator = AccessCoordinator::new(&config);
        kinfo!("{}: ready, {} byte buffer", config.name, config.capacity);
        Ok(Arc::new(Self {
            config,
            coordinator,
            open_handles: AtomicUsize::new(0),
        }))
    }

    /// Create a default-named device with the given capacity
    pub fn with_capacity(capacity: usize) -> MemResult<Arc<Self>> {
        Self::new(DeviceConfig::new().capacity(capacity))
    }

    /// Open a new session at position 0
    pub fn open(self: &Arc<Self>, options: OpenOptions) -> Handle {
        let handle = Handle::new(Arc::clone(self), options);
        let open = self.open_handles.fetch_add(1, Ordering::Relaxed) + 1;
        kdebug!(
            "{}: handle {} opened ({}), {} open",
            self.name(),
            handle.id(),
            if handle.is_blocking() { "blocking" } else { "nonblocking" },
            open
        );
        handle
    }

    pub(crate) fn release(&self) {
        self.open_handles.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Relaxed)
    }

    pub fn coordinator(&self) -> &AccessCoordinator {
        &self.coordinator
    }

    /// Register a readiness hook not tied to any handle
    pub fn subscribe(&self, hook: Arc<dyn ReadinessHook>) -> HookId {
        self.coordinator.subscribe(hook)
    }

    /// Remove a readiness hook; returns false if it was not registered
    pub fn unsubscribe(&self, id: HookId) -> bool {
        self.coordinator.unsubscribe(id)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        kdebug!("{}: released", self.config.name);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.config.name)
            .field("capacity", &self.config.capacity)
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<Device>> = OnceLock::new();

/// The process-wide device, built from `DeviceConfig::from_env()` on first use
pub fn global() -> MemResult<&'static Arc<Device>> {
    if let Some(device) = GLOBAL.get() {
        return Ok(device);
    }
    let device = Device::new(DeviceConfig::from_env())?;
    Ok(GLOBAL.get_or_init(move || device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use globalmem_core::MemError;

    #[test]
    fn test_new_rejects_bad_config() {
        let err = Device::new(DeviceConfig::new().capacity(0)).unwrap_err();
        assert!(matches!(err, MemError::InvalidConfig(_)));
    }

    #[test]
    fn test_open_counts_handles() {
        let dev = Device::with_capacity(16).unwrap();
        assert_eq!(dev.name(), "globalmem");
        assert_eq!(dev.capacity(), 16);

        let a = dev.open(OpenOptions::new());
        let b = dev.open(OpenOptions::new().nonblocking(true));
        assert_eq!(dev.open_handles(), 2);

        drop(a);
        assert_eq!(dev.open_handles(), 1);
        b.close();
        assert_eq!(dev.open_handles(), 0);
    }

    #[test]
    fn test_handles_keep_device_alive() {
        let dev = Device::with_capacity(16).unwrap();
        let handle = dev.open(OpenOptions::new().nonblocking(true));
        drop(dev);

        assert_eq!(handle.write(b"still here").unwrap(), 10);
        assert_eq!(handle.device().coordinator().len(), 10);
    }

    #[test]
    fn test_global_is_shared() {
        let _env = crate::config::ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let a = global().unwrap();
        let b = global().unwrap();
        assert!(Arc::ptr_eq(a, b));
    }
}
