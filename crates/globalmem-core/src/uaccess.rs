//! Caller buffer access
//!
//! Reads copy out of the device into a `UserBufMut`, writes copy into the
//! device from a `UserBuf`. Slices and vectors never fault; other
//! implementations (mapped regions, checked guest memory, tests) may return
//! `CopyFault`, in which case the device leaves its buffer untouched.

use crate::error::CopyFault;

/// Destination of a read
pub trait UserBufMut {
    /// Number of bytes the caller asked for
    fn user_len(&self) -> usize;

    /// Copy `src` into the first `src.len()` bytes of the buffer
    ///
    /// `src.len()` never exceeds `user_len()`.
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), CopyFault>;
}

/// Source of a write
pub trait UserBuf {
    /// Number of bytes the caller offered
    fn user_len(&self) -> usize;

    /// Fill `dst` from the first `dst.len()` bytes of the buffer
    ///
    /// `dst.len()` never exceeds `user_len()`.
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), CopyFault>;
}

impl UserBufMut for [u8] {
    #[inline]
    fn user_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), CopyFault> {
        self.get_mut(..src.len())
            .ok_or(CopyFault)?
            .copy_from_slice(src);
        Ok(())
    }
}

impl UserBuf for [u8] {
    #[inline]
    fn user_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        dst.copy_from_slice(self.get(..dst.len()).ok_or(CopyFault)?);
        Ok(())
    }
}

impl<const N: usize> UserBufMut for [u8; N] {
    #[inline]
    fn user_len(&self) -> usize {
        N
    }

    #[inline]
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), CopyFault> {
        self.as_mut_slice().copy_to_user(src)
    }
}

impl<const N: usize> UserBuf for [u8; N] {
    #[inline]
    fn user_len(&self) -> usize {
        N
    }

    #[inline]
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        self.as_slice().copy_from_user(dst)
    }
}

impl UserBufMut for Vec<u8> {
    #[inline]
    fn user_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), CopyFault> {
        self.as_mut_slice().copy_to_user(src)
    }
}

impl UserBuf for Vec<u8> {
    #[inline]
    fn user_len(&self) -> usize {
        self.len()
    }

    #[inline]
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), CopyFault> {
        self.as_slice().copy_from_user(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_copy_to_user() {
        let mut out = [0u8; 4];
        out.copy_to_user(b"ab").unwrap();
        assert_eq!(&out, b"ab\0\0");
    }

    #[test]
    fn test_slice_copy_to_user_overrun_faults() {
        let mut out = [0u8; 2];
        assert_eq!(out.copy_to_user(b"abc"), Err(CopyFault));
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn test_slice_copy_from_user() {
        let src: &[u8] = b"hello";
        let mut dst = [0u8; 3];
        src.copy_from_user(&mut dst).unwrap();
        assert_eq!(&dst, b"hel");
    }

    #[test]
    fn test_vec_uses_current_length() {
        let mut v = Vec::with_capacity(64);
        v.extend_from_slice(&[0u8; 3]);
        assert_eq!(UserBufMut::user_len(&v), 3);
        assert_eq!(v.copy_to_user(b"abcd"), Err(CopyFault));
        v.copy_to_user(b"xyz").unwrap();
        assert_eq!(v, b"xyz");
    }
}
