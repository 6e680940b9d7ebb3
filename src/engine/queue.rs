// src/engine/queue.rs

//! Multi-producer / multi-consumer FIFO used both as the executor's work
//! queue and as the worker pool's job inbox.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// FIFO of work items, safe for concurrent push and pop.
///
/// Elements pushed by a single thread are popped in push order; fairness
/// across concurrent pushers is whatever the lock hands out.
pub(crate) struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> WorkQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Point-in-time size; racy by nature, callers re-check under their own
    /// predicates.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        if inner.closed {
            // Late push after close: drop on the floor, the run is over.
            return;
        }
        inner.items.push_back(item);
        drop(inner);
        self.ready.notify_one();
    }

    /// Pop the oldest element, blocking until one is available.
    ///
    /// Returns `None` only once the queue has been closed and emptied.
    pub(crate) fn take(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Non-blocking form of [`take`]: `None` means "nothing right now".
    pub(crate) fn try_take(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Close the queue: wakes all blocked consumers; pending items can still
    /// be drained, further pushes are dropped.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.ready.notify_all();
    }
}
