//! Ready-made readiness hooks
//!
//! A hook is anything implementing `ReadinessHook`; closures qualify. This
//! module provides two that bridge to other wait mechanisms:
//!
//! - `ReadinessLatch` - lets a thread sleep until a chosen readiness fires
//! - `EventFdHook` (Linux) - bumps an eventfd so an epoll/poll loop wakes

mod latch;

pub use latch::ReadinessLatch;

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod eventfd_linux;
        pub use eventfd_linux::EventFdHook;
    }
}
