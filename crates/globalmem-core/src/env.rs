//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment variables with defaults,
//! plus `env_get_size` for byte counts written in decimal or hex.
//!
//! # Usage
//!
//! ```ignore
//! use globalmem_core::env::{env_get, env_get_bool, env_get_size};
//!
//! let capacity = env_get_size("GLOBALMEM_SIZE", 0x1000);
//! let wake_all = env_get_bool("GLOBALMEM_WAKE_ALL", true);
//! let name: String = env_get("GLOBALMEM_NAME", "globalmem".to_string());
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset or unparsable values both yield the default.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true. Anything
/// else that is set is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

/// Get environment variable as a byte count
///
/// Accepts decimal (`4096`) or hex with a `0x` prefix (`0x1000`).
pub fn env_get_size(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

pub(crate) fn parse_bool(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub(crate) fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

// ============================================================================
// Tests
// ============================================================================
