use core::cmp::min;

/// Byte storage behind a [`FrameBuffer`]. Implemented for `Vec<u8>` (heap,
/// unbounded) and [`FixedBuffer`] (inline array, no allocation). Other storage
/// works too; the `fb_*` unit tests show what an implementation must get right.
pub trait UnderlyingBuffer:
    core::ops::Index<core::ops::Range<usize>, Output = [u8]> + core::ops::Index<usize, Output = u8>
{
    /// Removes all elements from the buffer.
    fn clear(&mut self);

    /// Returns the number of elements currently stored in the buffer.
    fn len(&self) -> usize;

    /// Returns the maximum capacity of this buffer.
    ///
    /// The Vec implementation returns `usize::MAX`; the effective bound of a
    /// [`FrameBuffer`] then comes from its configured capacity.
    fn max_capacity(&self) -> usize;

    /// Returns the number of bytes not copied over due to buffer size constraints.
    fn extend_from_slice(&mut self, other: &[u8]) -> usize;

    /// Removes the first `count` elements from the buffer. Cannot fail.
    fn drain(&mut self, count: usize);

    /// Returns whether the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UnderlyingBuffer for Vec<u8> {
    fn clear(&mut self) {
        self.clear();
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn max_capacity(&self) -> usize {
        usize::MAX
    }

    fn extend_from_slice(&mut self, other: &[u8]) -> usize {
        self.extend_from_slice(other);
        0
    }

    fn drain(&mut self, count: usize) {
        let count = min(count, self.len());
        self.drain(0..count);
    }
}

/// An owned, fixed-size linear buffer with a capacity known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedBuffer<const N: usize> {
    buffer: [u8; N],
    len: usize,
}

impl<const N: usize> FixedBuffer<N> {
    /// Creates a new, empty `FixedBuffer`.
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            len: 0,
        }
    }
}

impl<const N: usize> Default for FixedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::ops::Index<core::ops::Range<usize>> for FixedBuffer<N> {
    type Output = [u8];

    fn index(&self, index: core::ops::Range<usize>) -> &Self::Output {
        if index.end > self.len {
            panic!(
                "index out of bounds: the len is {len} but the index is {idx}",
                len = self.len,
                idx = index.end
            );
        }
        &self.buffer[index]
    }
}

impl<const N: usize> core::ops::Index<usize> for FixedBuffer<N> {
    type Output = u8;

    fn index(&self, index: usize) -> &Self::Output {
        if index >= self.len {
            panic!(
                "index out of bounds: the len is {len} but the index is {idx}",
                len = self.len,
                idx = index
            );
        }
        &self.buffer[index]
    }
}

impl<const N: usize> UnderlyingBuffer for FixedBuffer<N> {
    fn clear(&mut self) {
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn max_capacity(&self) -> usize {
        N
    }

    fn extend_from_slice(&mut self, other: &[u8]) -> usize {
        let available_space = N - self.len;
        let to_copy = min(other.len(), available_space);

        self.buffer[self.len..self.len + to_copy].copy_from_slice(&other[..to_copy]);
        self.len += to_copy;

        other.len() - to_copy // Remainder that didn't fit in the buffer
    }

    fn drain(&mut self, count: usize) {
        if count >= self.len {
            self.len = 0;
            return;
        }

        let remaining = self.len - count;
        self.buffer.copy_within(count..self.len, 0);
        self.len = remaining;
    }
}

/// Result of a non-destructive read.
#[derive(Debug, PartialEq, Eq)]
pub struct Peek<'a> {
    pub bytes: &'a [u8],
    /// Fewer bytes than requested were available; ask again after the next append.
    pub truncated: bool,
}

/// Bounded byte accumulator sitting between the transport and the decoders.
///
/// Appending never blocks and never grows past the capacity: the oldest
/// unconsumed bytes are dropped instead and their count is returned.
pub struct FrameBuffer<T: UnderlyingBuffer = Vec<u8>> {
    buf: T,
    capacity: usize,
}

impl FrameBuffer<Vec<u8>> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Vec::new(), capacity)
    }
}

impl<T: UnderlyingBuffer> FrameBuffer<T> {
    /// The effective capacity is the smaller of `capacity` and what `underlying` can hold.
    pub fn new(mut underlying: T, capacity: usize) -> Self {
        underlying.clear();
        let capacity = min(capacity, underlying.max_capacity());
        Self {
            buf: underlying,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Adds `bytes`, returning how many of the oldest bytes were dropped to make room.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        if bytes.len() >= self.capacity {
            let dropped = self.buf.len() + bytes.len() - self.capacity;
            self.buf.clear();
            self.buf.extend_from_slice(&bytes[bytes.len() - self.capacity..]);
            return dropped;
        }

        let dropped = (self.buf.len() + bytes.len()).saturating_sub(self.capacity);
        if dropped > 0 {
            self.buf.drain(dropped);
        }
        let not_copied = self.buf.extend_from_slice(bytes);
        debug_assert_eq!(not_copied, 0);
        dropped
    }

    pub fn peek(&self, offset: usize, length: usize) -> Peek<'_> {
        let start = min(offset, self.buf.len());
        let end = min(offset.saturating_add(length), self.buf.len());
        Peek {
            bytes: &self.buf[start..end],
            truncated: end - start < length,
        }
    }

    /// All buffered bytes, oldest first.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[0..self.buf.len()]
    }

    /// Discards the first `length` bytes (or everything, if fewer are buffered).
    pub fn consume(&mut self, length: usize) {
        self.buf.drain(length);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
