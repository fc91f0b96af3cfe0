//! Bounded, thread-safe FIFO used for both packet and frame handoff.
//!
//! `push` blocks while the queue is full; `pop` never blocks. A closed queue
//! rejects both, which callers treat as "stream torn down" rather than an
//! error. Each queue carries an epoch counter bumped on every seek.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Pushers are woken in bulk once occupancy falls below 1/LOW_WATERMARK_DIVISOR
const LOW_WATERMARK_DIVISOR: usize = 5;

struct Inner<T> {
    items: VecDeque<T>,
    /// Incremented by every flush so pushers blocked across it can tell
    flush_generation: u64,
}

pub struct BoundedQueue<T> {
    name: &'static str,
    inner: Mutex<Inner<T>>,
    capacity: usize,
    not_full: Condvar,
    not_empty: Condvar,
    opened: AtomicBool,
    epoch: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Create a closed queue; call [`open`](Self::open) before use.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                flush_generation: 0,
            }),
            capacity: capacity.max(1),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            opened: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn open(&self) {
        self.opened.store(true, Ordering::Release);
    }

    /// Reject further push/pop and wake everyone waiting. Contents are kept.
    pub fn close(&self) {
        self.opened.store(false, Ordering::Release);
        // Taking the lock orders this notify after any waiter's open check
        let _inner = self.inner.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Insert at the back, blocking while the queue is at capacity.
    ///
    /// Returns false without inserting if the queue is closed, or if it was
    /// flushed while this call was waiting for room (the item belongs to the
    /// content that flush discarded).
    pub fn push(&self, item: T) -> bool {
        self.push_while(item, || true)
    }

    /// [`push`](Self::push) that also gives up once `keep` turns false.
    ///
    /// `keep` is evaluated under the queue lock before inserting and after
    /// every wake-up, so an item rejected here can never land behind a
    /// flush that already ran.
    pub fn push_while(&self, item: T, keep: impl Fn() -> bool) -> bool {
        if !self.is_open() {
            return false;
        }

        let mut inner = self.inner.lock();
        let generation = inner.flush_generation;
        while inner.items.len() >= self.capacity {
            if !self.is_open() || !keep() {
                return false;
            }
            self.not_full.wait(&mut inner);
            if inner.flush_generation != generation {
                tracing::trace!(queue = self.name, "push discarded by flush");
                return false;
            }
        }
        if !self.is_open() || !keep() {
            return false;
        }

        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Take the front item without blocking.
    pub fn pop(&self) -> Option<T> {
        self.pop_with_epoch().map(|(item, _)| item)
    }

    /// [`pop`](Self::pop) plus the epoch the item was queued in, read under
    /// the same lock as the removal.
    pub fn pop_with_epoch(&self) -> Option<(T, u64)> {
        if !self.is_open() {
            return None;
        }

        let mut inner = self.inner.lock();
        let item = inner.items.pop_front()?;
        self.notify_pushers(inner.items.len());
        Some((item, self.epoch()))
    }

    /// Like [`pop`](Self::pop) but waits up to `timeout` for an item.
    /// Used as a short backoff instead of spinning on an empty queue.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.pop_timeout_with_epoch(timeout).map(|(item, _)| item)
    }

    pub fn pop_timeout_with_epoch(&self, timeout: Duration) -> Option<(T, u64)> {
        if !self.is_open() {
            return None;
        }

        let mut inner = self.inner.lock();
        if inner.items.is_empty() {
            self.not_empty.wait_for(&mut inner, timeout);
            if !self.is_open() {
                return None;
            }
        }
        let item = inner.items.pop_front()?;
        self.notify_pushers(inner.items.len());
        Some((item, self.epoch()))
    }

    fn notify_pushers(&self, len: usize) {
        if len < self.capacity / LOW_WATERMARK_DIVISOR {
            self.not_full.notify_all();
        } else {
            self.not_full.notify_one();
        }
    }

    /// Empty the queue and release every blocked pusher.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.items.clear();
        inner.flush_generation = inner.flush_generation.wrapping_add(1);
        self.not_full.notify_all();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().items.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Flush and start a new epoch in one step, so no pop can return an
    /// old item tagged with the new epoch. Returns the new epoch.
    pub fn flush_into_new_epoch(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.items.clear();
        inner.flush_generation = inner.flush_generation.wrapping_add(1);
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.not_full.notify_all();
        epoch
    }
}
