//! A contiguous async byte ring.
//!
//! A fixed-capacity single-producer/single-consumer byte ring that
//! never splits a variable-length run across the capacity boundary.
//! Ported from `original_source/src/RingBuffer.h`'s
//! `ContigousAsyncBuffer`, generalized from fixed-size objects to
//! variable-length byte runs and to a four-case `read()` (the C++
//! original only ever dealt in one case, since every object there was
//! the same fixed size).
//!
//! `read` is only ever advanced by the consumer; `write` and
//! `watermark` only by the producer. Every store here is a release of
//! the bytes it bounds, every load an acquire, so a consumer that
//! observes an updated `write`/`watermark` also observes the bytes
//! they bound.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// A borrowed contiguous view into the ring, valid only until the next
/// `write` call on the same ring.
pub struct ReadView<'a> {
    ring: &'a AsyncByteRing,
    start: usize,
    len: usize,
}

impl<'a> ReadView<'a> {
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `start..start+len` was frozen by the producer before
        // this view was constructed, and the consumer is the only
        // thread that advances `read` past it.
        unsafe { std::slice::from_raw_parts(self.ring.data.as_ptr().add(self.start), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Busy-wait poll interval while a writer blocks for the reader to
/// catch up. The ring is not meant for producers that can permanently
/// outpace consumption.
const WAIT_POLL: Duration = Duration::from_micros(100);

pub struct AsyncByteRing {
    data: Box<[u8]>,
    capacity: usize,
    read: AtomicUsize,
    write: AtomicUsize,
    watermark: AtomicUsize,
}

// SAFETY: exactly one producer and one consumer thread are assumed by
// construction; all cross-thread communication goes through the
// atomics above.
unsafe impl Sync for AsyncByteRing {}

impl AsyncByteRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            capacity,
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            watermark: AtomicUsize::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes one contiguous byte run. Returns `false` if `bytes` is
    /// larger than the ring's capacity (can never fit).
    ///
    /// Producer-only; must not be called concurrently with itself.
    pub fn write(&self, bytes: &[u8]) -> bool {
        let len = bytes.len();
        if len > self.capacity {
            return false;
        }

        let cur_write = self.write.load(Ordering::Relaxed);
        let remaining = self.capacity - cur_write;

        if len <= remaining {
            // SAFETY: [cur_write, cur_write+len) is producer-owned
            // space; the consumer never writes.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    bytes.as_ptr(),
                    (self.data.as_ptr() as *mut u8).add(cur_write),
                    len,
                );
            }
            self.watermark.store(cur_write + len, Ordering::Release);
            self.write.store(cur_write + len, Ordering::Release);
        } else {
            // Wrap needed: wait until the consumer has read enough
            // from the front that the new run fits there.
            loop {
                let available = self.read.load(Ordering::Acquire);
                if len <= available {
                    break;
                }
                thread::sleep(WAIT_POLL);
            }
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.data.as_ptr() as *mut u8, len);
            }
            // Freeze the pre-wrap region so the consumer can still
            // drain it, then restart write at the front.
            self.watermark.store(cur_write, Ordering::Release);
            self.write.store(len, Ordering::Release);
        }
        true
    }

    /// Returns the next contiguous readable run, or `None` if the ring
    /// is empty. Consumer-only; must not be called concurrently with
    /// itself. The returned view must not be retained past the next
    /// `write`.
    pub fn read(&self) -> Option<ReadView<'_>> {
        let cur_write = self.write.load(Ordering::Acquire);
        let cur_read = self.read.load(Ordering::Relaxed);
        let watermark = self.watermark.load(Ordering::Acquire);

        if cur_write == cur_read {
            return None;
        }

        if cur_write > cur_read {
            let view = ReadView { ring: self, start: cur_read, len: cur_write - cur_read };
            self.read.store(cur_write, Ordering::Release);
            return Some(view);
        }

        // cur_write < cur_read: the producer has wrapped.
        if watermark > cur_read {
            let view = ReadView { ring: self, start: cur_read, len: watermark - cur_read };
            self.read.store(watermark, Ordering::Release);
            Some(view)
        } else {
            // watermark == cur_read: the pre-wrap region has already
            // been fully drained; the live data is now at the front.
            let view = ReadView { ring: self, start: 0, len: cur_write };
            self.read.store(cur_write, Ordering::Release);
            Some(view)
        }
    }
}
