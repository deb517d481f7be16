//! Control command codes
//!
//! The device answers a single control request, `MEM_CLEAR`, encoded the
//! way `_IO(GLOBAL_MAGIC, 0)` encodes it for the target platform.

use crate::error::{MemError, MemResult};

/// ioctl type byte for the device
pub const GLOBAL_MAGIC: u8 = b'g';

cfg_if::cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly",
    ))] {
        /// Zero the whole buffer (`_IO('g', 0)`)
        pub const MEM_CLEAR: u32 = nix::request_code_none!(GLOBAL_MAGIC, 0) as u32;
    } else {
        /// Zero the whole buffer (`_IO('g', 0)`, Linux encoding)
        pub const MEM_CLEAR: u32 = (GLOBAL_MAGIC as u32) << 8;
    }
}

/// Decoded control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Zero every byte of the buffer, leaving its length alone
    Clear,
}

impl ControlCommand {
    /// Decode a raw request code
    ///
    /// Unknown codes fail with `InvalidArgument`.
    pub fn from_code(code: u32) -> MemResult<Self> {
        match code {
            MEM_CLEAR => Ok(ControlCommand::Clear),
            _ => Err(MemError::InvalidArgument),
        }
    }

    /// Raw request code for this command
    pub fn code(self) -> u32 {
        match self {
            ControlCommand::Clear => MEM_CLEAR,
        }
    }
}

impl TryFrom<u32> for ControlCommand {
    type Error = MemError;

    fn try_from(code: u32) -> MemResult<Self> {
        Self::from_code(code)
    }
}
