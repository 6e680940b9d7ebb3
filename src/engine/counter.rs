// src/engine/counter.rs

//! Join-counters and the executor-wide wait group.
//!
//! Both vertices and graphs track "how many things are still outstanding"
//! with a [`Counter`]; the executor tracks every scheduled unit of work with
//! a [`WaitGroup`] so `wait` can block until the whole run is quiescent.

use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::{Condvar, Mutex};

/// Atomic signed counter used as a join-counter.
///
/// Sequentially consistent: the decrement performed when a predecessor
/// finishes pairs with the load performed when its successor is scheduled,
/// which is what carries the happens-before edge between user payloads.
#[derive(Debug, Default)]
pub(crate) struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub(crate) fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    pub(crate) fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub(crate) fn incr(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn decr(&self) {
        let prev = self.value.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "join-counter decremented below zero");
    }

    pub(crate) fn set(&self, v: i64) {
        self.value.store(v, Ordering::SeqCst);
    }
}

/// Counts outstanding scheduled units across the whole executor.
///
/// Every `schedule` of a vertex adds one slot, every invoker finaliser
/// releases one; each dispatcher itself holds a slot for the duration of its
/// graph so `wait` cannot return between `run` and entry scheduling.
#[derive(Debug, Default)]
pub(crate) struct WaitGroup {
    count: AtomicI64,
    lock: Mutex<()>,
    drained: Condvar,
}

impl WaitGroup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, n: i64) {
        self.count.fetch_add(n, Ordering::SeqCst);
    }

    pub(crate) fn done(&self) {
        let prev = self.count.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "wait group released more slots than acquired");
        if prev == 1 {
            let _guard = self.lock.lock();
            self.drained.notify_all();
        }
    }

    /// Block until the count drains to zero.
    pub(crate) fn wait(&self) {
        let mut guard = self.lock.lock();
        while self.count.load(Ordering::SeqCst) > 0 {
            self.drained.wait(&mut guard);
        }
    }
}
