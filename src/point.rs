//! Access points and the sliding window used to capture them.

use std::cmp;

/// A resumable decoder checkpoint at a DEFLATE block boundary.
///
/// See the module-level invariants in `store.rs`: points are only ever
/// appended in increasing `uncmp_offset` order and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    /// Byte offset in the compressed stream of the first byte of the next block.
    pub cmp_offset: u64,
    /// Unused low-order bits, in [0, 7], remaining before `cmp_offset`.
    pub bits: u8,
    /// Cumulative uncompressed bytes produced up to (not including) this block.
    pub uncmp_offset: u64,
    /// Exactly `window_size` bytes of uncompressed history preceding this point.
    pub window: Vec<u8>,
}

/// A ring buffer over the most recent `capacity` bytes of decoder output.
///
/// A runtime-configured capacity rather than a fixed 32 KiB, since this
/// index's `window_size` may be configured larger than the DEFLATE minimum.
pub(crate) struct RingBuffer {
    buffer: Vec<u8>,
    index: usize,
}

impl RingBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity],
            index: 0,
        }
    }

    /// Appends `buf` to the back of the ring, overwriting the oldest bytes
    /// once the buffer fills.
    pub(crate) fn write(&mut self, mut buf: &[u8]) {
        if buf.is_empty() || self.buffer.is_empty() {
            return;
        }

        if buf.len() > self.buffer.len() {
            buf = &buf[buf.len() - self.buffer.len()..];
        }

        while !buf.is_empty() {
            let size = cmp::min(buf.len(), self.buffer.len() - self.index);
            self.buffer[self.index..self.index + size].copy_from_slice(&buf[..size]);
            buf = &buf[size..];
            self.index = (self.index + size) % self.buffer.len();
        }
    }

    /// Returns the ring's contents oldest-to-newest as two slices (the
    /// storage may be non-contiguous): the front (oldest) and the back
    /// (most recently written).
    pub(crate) fn read(&self) -> (&[u8], &[u8]) {
        (&self.buffer[self.index..], &self.buffer[..self.index])
    }

    /// Materializes the ring's contents, oldest byte first, as a single
    /// contiguous buffer, the linear form an `AccessPoint` stores.
    pub(crate) fn to_linear(&self) -> Vec<u8> {
        let (left, right) = self.read();
        let mut out = Vec::with_capacity(left.len() + right.len());
        out.extend_from_slice(left);
        out.extend_from_slice(right);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ring_buffer_wraps_like_teacher() {
        let mut buffer = RingBuffer::new(100);

        assert_eq!(buffer.read(), ([0u8; 100].as_slice(), [0u8; 0].as_slice()));

        buffer.write(&[1u8; 50]);
        assert_eq!(buffer.read(), ([0u8; 50].as_slice(), [1u8; 50].as_slice()));

        buffer.write(&[2u8; 50]);
        let mut expected = Vec::new();
        expected.extend_from_slice(&[1u8; 50]);
        expected.extend_from_slice(&[2u8; 50]);
        assert_eq!(buffer.read(), (expected.as_slice(), [0u8; 0].as_slice()));

        buffer.write(&[3u8; 150]);
        assert_eq!(buffer.read(), ([3u8; 100].as_slice(), [0u8; 0].as_slice()));

        buffer.write(&[4u8; 75]);
        assert_eq!(buffer.read(), ([3u8; 25].as_slice(), [4u8; 75].as_slice()));
    }

    #[test]
    fn to_linear_matches_read_order() {
        let mut buffer = RingBuffer::new(8);
        buffer.write(&[1, 2, 3, 4, 5]);
        buffer.write(&[6, 7, 8, 9]);
        // Capacity 8, wrote 9 bytes total -> oldest byte (1) evicted.
        assert_eq!(buffer.to_linear(), vec![2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn exact_capacity_boundary_has_empty_second_half() {
        let mut buffer = RingBuffer::new(16);
        buffer.write(&(0..16).collect::<Vec<u8>>());
        let (left, right) = buffer.read();
        assert!(right.is_empty());
        assert_eq!(left, &(0..16).collect::<Vec<u8>>()[..]);
    }
}
