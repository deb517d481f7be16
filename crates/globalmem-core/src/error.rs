//! Error types for the globalmem device

use core::fmt;
use std::io;

/// Result type for device operations
pub type MemResult<T> = Result<T, MemError>;

/// Errors that can occur in device operations
///
/// None of these leave the shared buffer in an inconsistent state: every
/// check runs before the buffer is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemError {
    /// Non-blocking call found no data (read) or no space (write)
    WouldBlock,

    /// Blocking wait aborted by cancellation before any transfer
    Interrupted,

    /// Caller buffer could not be copied to or from
    FaultCopy,

    /// Out-of-range seek, unsupported whence or unknown control code
    InvalidArgument,

    /// Device configuration rejected at construction
    InvalidConfig(&'static str),
}

impl MemError {
    /// The errno a character device would report for this error
    pub fn errno(&self) -> i32 {
        match self {
            MemError::WouldBlock => libc::EAGAIN,
            MemError::Interrupted => libc::EINTR,
            MemError::FaultCopy => libc::EFAULT,
            MemError::InvalidArgument | MemError::InvalidConfig(_) => libc::EINVAL,
        }
    }

    /// Whether retrying the same call later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, MemError::WouldBlock | MemError::Interrupted)
    }
}

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemError::WouldBlock => write!(f, "operation would block"),
            MemError::Interrupted => write!(f, "wait interrupted"),
            MemError::FaultCopy => write!(f, "bad address in caller buffer"),
            MemError::InvalidArgument => write!(f, "invalid argument"),
            MemError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for MemError {}

/// Cancellation maps to `ErrorKind::Other`, not `Interrupted`: std helpers
/// (`read_to_end`, `write_all`, `io::copy`) retry `Interrupted` forever while
/// the token stays cancelled. The `MemError` is kept as the payload.
impl From<MemError> for io::Error {
    fn from(e: MemError) -> Self {
        let kind = match e {
            MemError::WouldBlock => io::ErrorKind::WouldBlock,
            MemError::Interrupted => io::ErrorKind::Other,
            MemError::FaultCopy => io::ErrorKind::InvalidData,
            MemError::InvalidArgument | MemError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, e)
    }
}

/// Error returned when a caller buffer rejects a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyFault;

impl fmt::Display for CopyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "copy fault")
    }
}

impl std::error::Error for CopyFault {}

impl From<CopyFault> for MemError {
    fn from(_: CopyFault) -> Self {
        MemError::FaultCopy
    }
}
