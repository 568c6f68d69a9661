//! 4.B: a growable, pool-backed byte region with random-access overwrite,
//! used to back an in-progress encode so the framed frontend can reserve a
//! size slot and backpatch it once the payload is known (`4.F`).

use std::io::{self, Write};
use std::sync::Mutex;

/// The pool contract from `6`: opaque fixed-capacity byte segments handed
/// out on `acquire` and returned on `release`. The codec never inspects a
/// segment's contents outside of an owning [`InternalBuffer`].
pub trait SegmentPool: Send + Sync {
    fn acquire(&self) -> Vec<u8>;
    fn release(&self, segment: Vec<u8>);
}

/// A `Vec`-backed pool of reusable segments, scoped to one process. Real
/// deployments might back this with a shared arena; the codec only
/// requires the two methods above.
pub struct LocalPool {
    segment_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl LocalPool {
    pub fn new(segment_size: usize) -> Self {
        Self {
            segment_size,
            free: Mutex::new(Vec::new()),
        }
    }
}

impl SegmentPool for LocalPool {
    fn acquire(&self) -> Vec<u8> {
        let mut free = self.free.lock().expect("pool mutex poisoned");
        match free.pop() {
            Some(mut segment) => {
                segment.clear();
                segment
            }
            None => Vec::with_capacity(self.segment_size),
        }
    }

    fn release(&self, segment: Vec<u8>) {
        let mut free = self.free.lock().expect("pool mutex poisoned");
        free.push(segment);
    }
}

/// The internal buffer owned exclusively by a single encode call. The
/// leased segment is returned to the pool on every exit path via `Drop`,
/// including early returns on error.
pub struct InternalBuffer<'p> {
    pool: &'p dyn SegmentPool,
    data: Vec<u8>,
}

impl<'p> InternalBuffer<'p> {
    pub fn new(pool: &'p dyn SegmentPool) -> Self {
        Self {
            pool,
            data: pool.acquire(),
        }
    }

    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Reserves `width` zero bytes at the current position and returns
    /// where they start, to be filled in later via [`Self::overwrite`]
    /// once the payload length is known.
    pub fn reserve(&mut self, width: usize) -> usize {
        let at = self.data.len();
        self.data.resize(at + width, 0);
        at
    }

    pub fn overwrite(&mut self, at: usize, bytes: &[u8]) {
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Streams `buffer[start..end]` to `sink` without exposing internal
    /// pointers. `start == end` copies nothing.
    pub fn copy_to<W: Write>(&self, sink: &mut W, start: usize, end: usize) -> io::Result<()> {
        sink.write_all(&self.data[start..end])
    }

    pub fn reset(&mut self) {
        let empty = self.pool.acquire();
        let leased = std::mem::replace(&mut self.data, empty);
        self.pool.release(leased);
    }
}

impl<'p> Write for InternalBuffer<'p> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'p> Drop for InternalBuffer<'p> {
    fn drop(&mut self) {
        let leased = std::mem::take(&mut self.data);
        self.pool.release(leased);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_to_matches_every_subrange() {
        let pool = LocalPool::new(64);
        let mut buf = InternalBuffer::new(&pool);
        for i in 0..100u8 {
            buf.write_byte(i);
        }
        for start in 0..=100 {
            for end in start..=100 {
                let mut out = Vec::new();
                buf.copy_to(&mut out, start, end).unwrap();
                assert_eq!(out.len(), end - start);
                assert_eq!(out, (start as u8..end as u8).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn reserve_then_overwrite_backpatches_in_place() {
        let pool = LocalPool::new(64);
        let mut buf = InternalBuffer::new(&pool);
        let slot = buf.reserve(4);
        buf.write_byte(0xAB);
        buf.overwrite(slot, &[1, 2, 3, 4]);
        let mut out = Vec::new();
        buf.copy_to(&mut out, 0, buf.position()).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 0xAB]);
    }

    #[test]
    fn reset_returns_segment_and_zeros_cursor() {
        let pool = LocalPool::new(64);
        let mut buf = InternalBuffer::new(&pool);
        buf.write_byte(1);
        buf.reset();
        assert_eq!(buf.position(), 0);
    }
}
