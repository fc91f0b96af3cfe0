//! Staging buffer between the audio frame queue and the device callback.
//!
//! Holds the bytes of one decoded audio frame and hands them out in whatever
//! slice sizes the device asks for. Invariant: `offset <= size <= capacity`.

/// Resettable byte buffer drained incrementally by the audio pull path
#[derive(Debug, Clone)]
pub struct AudioStagingBuffer {
    data: Vec<u8>,
    size: usize,
    offset: usize,
}

impl AudioStagingBuffer {
    /// Create an empty buffer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            size: 0,
            offset: 0,
        }
    }

    /// Replace the contents with one frame's bytes and rewind.
    /// Grows the backing storage if the frame does not fit.
    pub fn refill(&mut self, bytes: &[u8]) {
        if bytes.len() > self.data.len() {
            self.data.resize(bytes.len(), 0);
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.size = bytes.len();
        self.offset = 0;
    }

    /// Copy up to `dst.len()` unread bytes into `dst`, advancing the offset.
    /// Returns the number of bytes copied.
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = self.remaining().min(dst.len());
        dst[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
        self.offset += n;
        n
    }

    /// Drop whatever is staged
    pub fn clear(&mut self) {
        self.size = 0;
        self.offset = 0;
    }

    pub fn remaining(&self) -> usize {
        self.size - self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}
