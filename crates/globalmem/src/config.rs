//! Device configuration

use globalmem_core::constants::{DEVICE_NAME, GLOBALMEM_SIZE};
use globalmem_core::env::{env_get_bool, env_get_size, env_get_str};
use globalmem_core::{MemError, MemResult};

/// Configuration for a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Name used in log lines
    pub name: String,

    /// Buffer capacity in bytes, fixed for the device's lifetime
    pub capacity: usize,

    /// Wake every waiter of the other side on a transfer (default: true)
    ///
    /// With `false` one waiter is woken per transfer and woken waiters pass
    /// the wakeup on while the condition still holds.
    pub wake_all: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEVICE_NAME.to_string(),
            capacity: GLOBALMEM_SIZE,
            wake_all: true,
        }
    }
}

impl DeviceConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with environment variables
    ///
    /// - `GLOBALMEM_NAME` - device name
    /// - `GLOBALMEM_SIZE` - capacity, decimal or `0x` hex
    /// - `GLOBALMEM_WAKE_ALL` - 1/true/yes/on to wake all waiters
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env_get_str("GLOBALMEM_NAME", &defaults.name),
            capacity: env_get_size("GLOBALMEM_SIZE", defaults.capacity),
            wake_all: env_get_bool("GLOBALMEM_WAKE_ALL", defaults.wake_all),
        }
    }

    /// Set the device name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the buffer capacity
    pub fn capacity(mut self, bytes: usize) -> Self {
        self.capacity = bytes;
        self
    }

    /// Choose between waking all waiters or one per transfer
    pub fn wake_all(mut self, enable: bool) -> Self {
        self.wake_all = enable;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> MemResult<()> {
        if self.capacity == 0 {
            return Err(MemError::InvalidConfig("capacity must be at least 1"));
        }
        if self.capacity > i64::MAX as usize {
            return Err(MemError::InvalidConfig("capacity exceeds seekable range"));
        }
        if self.name.trim().is_empty() {
            return Err(MemError::InvalidConfig("name must not be empty"));
        }
        Ok(())
    }
}

/// Held by tests that set or read `GLOBALMEM_*` variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
