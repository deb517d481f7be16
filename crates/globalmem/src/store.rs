//! Fixed-capacity FIFO byte store
//!
//! Plain data with no locking of its own: the coordinator keeps it behind
//! its mutex and is the only caller.
//!
//! Layout: the first `length` bytes of `data` are unread content in FIFO
//! order. Everything after that is stale and never handed out.

/// The shared byte buffer and its valid-length counter
pub struct BufferStore {
    /// Exactly `capacity` bytes
    data: Box<[u8]>,

    /// Bytes of valid content at the front of `data`
    length: usize,
}

impl BufferStore {
    /// Create a zero-filled, empty store
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            length: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes of valid content
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.length == self.data.len()
    }

    /// Bytes that can still be appended
    #[inline]
    pub fn space(&self) -> usize {
        self.data.len() - self.length
    }

    /// The valid content, oldest byte first
    #[cfg(test)]
    pub fn contents(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Zero every byte of the buffer
    ///
    /// `length` is left as it is: content still counted as valid reads back
    /// as zeros.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Drop the first `n` bytes and shift the rest to the front
    pub fn compact_after_consume(&mut self, n: usize) {
        assert!(n <= self.length, "consume {} of {} bytes", n, self.length);
        self.data.copy_within(n..self.length, 0);
        self.length -= n;
    }

    /// Append `bytes` after the current content
    #[cfg(test)]
    pub fn append(&mut self, bytes: &[u8]) {
        let n = bytes.len();
        assert!(n <= self.space(), "append {} with {} free", n, self.space());
        self.data[self.length..self.length + n].copy_from_slice(bytes);
        self.length += n;
    }

    /// Hand the first `n` bytes to `copy`, then consume them
    ///
    /// If `copy` fails the store is left unchanged.
    pub fn consume_with<E>(
        &mut self,
        n: usize,
        copy: impl FnOnce(&[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        assert!(n <= self.length, "consume {} of {} bytes", n, self.length);
        copy(&self.data[..n])?;
        self.compact_after_consume(n);
        Ok(())
    }

    /// Let `fill` write `n` bytes after the current content, then commit them
    ///
    /// If `fill` fails `length` is left unchanged; whatever it wrote past
    /// the content stays invisible.
    pub fn append_with<E>(
        &mut self,
        n: usize,
        fill: impl FnOnce(&mut [u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        assert!(n <= self.space(), "append {} with {} free", n, self.space());
        fill(&mut self.data[self.length..self.length + n])?;
        self.length += n;
        Ok(())
    }
}

impl std::fmt::Debug for BufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStore")
            .field("capacity", &self.capacity())
            .field("length", &self.length)
            .finish()
    }
}
