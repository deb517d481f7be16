//! # globalmem - Shared bounded buffer device
//!
//! An in-process model of the classic `globalmem` character device: one
//! fixed-capacity byte buffer shared by every handle opened on it.
//!
//! ## Features
//!
//! - **FIFO transfer**: writes append, reads consume from the front
//! - **Blocking and non-blocking** handles, chosen at open time
//! - **Cancellation**: a blocked read/write returns `Interrupted` when its
//!   handle's token is cancelled
//! - **Bounded seek** over `[0, capacity]`, plus a clear control command
//! - **Readiness hooks** called after transfers, for poll/async delivery
//!
//! ## Quick Start
//!
//! ```ignore
//! use globalmem::{Device, DeviceConfig, OpenOptions};
//!
//! let dev = Device::new(DeviceConfig::new().capacity(64))?;
//! let writer = dev.open(OpenOptions::new());
//! let reader = dev.open(OpenOptions::new().nonblocking(true));
//!
//! writer.write(b"hello")?;
//! let mut buf = [0u8; 16];
//! let n = reader.read(&mut buf)?;
//! assert_eq!(&buf[..n], b"hello");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             Handle (position, blocking, token)              │
//! │          read(), write(), llseek(), control(), poll()       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    AccessCoordinator                        │
//! │   store lock, readable/writable wait queues, hook registry  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BufferStore                           │
//! │           capacity bytes, length, compaction                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod device;
pub mod handle;
pub mod hooks;
pub mod notify;
mod store;
mod wait;

// Re-export core types
pub use globalmem_core::{
    constants, CancelRegistration, CancelWaker, CancellationToken, ControlCommand, CopyFault,
    MemError, MemResult, Readiness, ReadinessHook, UserBuf, UserBufMut, GLOBAL_MAGIC, MEM_CLEAR,
};

// Re-export kprint macros for debug logging
pub use globalmem_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use globalmem_core::kprint::{
    init as init_logging, set_flush_enabled, set_log_level, set_time_enabled, LogLevel,
};

// Re-export env utilities
pub use globalmem_core::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

pub use config::DeviceConfig;
pub use coordinator::{AccessCoordinator, Whence};
pub use device::{global, Device};
pub use handle::{Handle, OpenOptions};
pub use hooks::HookId;
pub use notify::ReadinessLatch;
#[cfg(target_os = "linux")]
pub use notify::EventFdHook;
