//! The bounded, drop-oldest jitter queue.
//!
//! Grounded on `original_source/src/client.cpp`'s `JitterBuffer`
//! (`std::queue` + mutex + drop-oldest-on-full `push`), generalized
//! from a hard-coded Opus packet type to any `T` and to a type that
//! doesn't need a condition variable (the mix path polls once per
//! tick rather than blocking on arrival).

use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct JitterQueue<T> {
    inner: Mutex<VecDeque<T>>,
    depth: usize,
}

impl<T> JitterQueue<T> {
    pub fn new(depth: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(depth)), depth }
    }

    /// Enqueues `item`, discarding the oldest entry first if the queue
    /// is already at `depth`.
    pub fn push(&self, item: T) {
        let mut guard = self.inner.lock();
        if guard.len() >= self.depth {
            guard.pop_front();
        }
        guard.push_back(item);
    }

    /// Removes and returns the oldest entry, or `None` if empty.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Discards every queued entry (used to resync after a decoder
    /// fault).
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
