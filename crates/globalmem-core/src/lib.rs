//! # globalmem-core
//!
//! Core types for the globalmem shared buffer device.
//!
//! This crate holds everything that does not depend on how the buffer is
//! locked or waited on. The device itself lives in the `globalmem` crate.
//!
//! ## Modules
//!
//! - `cancel` - Cancellation token that can interrupt a blocked reader/writer
//! - `error` - Error types and errno mapping
//! - `uaccess` - Caller buffer traits (copy to/from the caller)
//! - `readiness` - Readable/writable readiness set and the hook trait
//! - `ioctl` - Control command codes
//! - `spinlock` - Internal spinlock for short registry critical sections
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod cancel;
pub mod error;
pub mod uaccess;
pub mod readiness;
pub mod ioctl;
pub mod spinlock;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use cancel::{CancelRegistration, CancelWaker, CancellationToken};
pub use error::{CopyFault, MemError, MemResult};
pub use uaccess::{UserBuf, UserBufMut};
pub use readiness::{Readiness, ReadinessHook};
pub use ioctl::{ControlCommand, GLOBAL_MAGIC, MEM_CLEAR};
pub use spinlock::SpinLock;
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

/// Constants shared by every device instance
pub mod constants {
    /// Reference buffer capacity (one page)
    pub const GLOBALMEM_SIZE: usize = 0x1000;

    /// Reference device name
    pub const DEVICE_NAME: &str = "globalmem";
}
