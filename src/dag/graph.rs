// src/dag/graph.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::dag::node::Node;
use crate::engine::counter::Counter;
use crate::profile::Span;

/// Mutex + condition variable the dispatcher parks on while the graph has
/// outstanding work but nothing is ready.
///
/// Signallers take the mutex before notifying: state lives in atomics and
/// the work queue, so notifying without the lock could slip between the
/// dispatcher's predicate check and its wait.
pub(crate) struct SchedCondition {
    lock: Mutex<()>,
    cond: Condvar,
}

impl SchedCondition {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub(crate) fn wait(&self, guard: &mut MutexGuard<'_, ()>) {
        self.cond.wait(guard);
    }

    pub(crate) fn signal(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_one();
    }

    pub(crate) fn broadcast(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}

/// The execution graph: owns its vertices, the graph-level join-counter and
/// the cancellation latch the scheduler drives a run with.
pub(crate) struct Graph {
    name: String,
    nodes: RwLock<Vec<Arc<Node>>>,
    entries: Mutex<Vec<Arc<Node>>>,
    join: Counter,
    cancelled: AtomicBool,
    sched: SchedCondition,
    // Latched once a subflow's builder has populated this graph; later runs
    // reuse the populated graph as-is.
    instancelized: AtomicBool,
    // Span of the subflow dispatch driving the current run, if any. Spans of
    // this graph's vertices hang under it in the profile no matter which
    // dispatcher ends up popping them.
    parent_span: Mutex<Option<Arc<Span>>>,
}

impl Graph {
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            nodes: RwLock::new(Vec::new()),
            entries: Mutex::new(Vec::new()),
            join: Counter::new(),
            cancelled: AtomicBool::new(false),
            sched: SchedCondition::new(),
            instancelized: AtomicBool::new(false),
            parent_span: Mutex::new(None),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn push(&self, node: Arc<Node>) {
        self.nodes.write().push(node);
    }

    pub(crate) fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().clone()
    }

    pub(crate) fn join_counter(&self) -> i64 {
        self.join.value()
    }

    pub(crate) fn join_incr(&self) {
        self.join.incr();
    }

    pub(crate) fn join_decr(&self) {
        self.join.decr();
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn sched(&self) -> &SchedCondition {
        &self.sched
    }

    pub(crate) fn parent_span(&self) -> Option<Arc<Span>> {
        self.parent_span.lock().clone()
    }

    pub(crate) fn set_parent_span(&self, span: Option<Arc<Span>>) {
        *self.parent_span.lock() = span;
    }

    pub(crate) fn is_instancelized(&self) -> bool {
        self.instancelized.load(Ordering::SeqCst)
    }

    pub(crate) fn set_instancelized(&self) {
        self.instancelized.store(true, Ordering::SeqCst);
    }

    /// Entry vertices (no predecessors), recomputed by the last `setup`.
    pub(crate) fn entries(&self) -> Vec<Arc<Node>> {
        self.entries.lock().clone()
    }

    fn reset(&self) {
        self.join.set(0);
        self.entries.lock().clear();
        self.cancelled.store(false, Ordering::SeqCst);
        for node in self.nodes.read().iter() {
            node.reset_join();
        }
    }

    /// (Re)initialise the graph for a run: zero every counter, clear the
    /// cancellation latch, recompute per-vertex join-counters and the entry
    /// list. A completed graph may be set up and run again.
    pub(crate) fn setup(&self) {
        self.reset();

        let mut entries = self.entries.lock();
        for node in self.nodes.read().iter() {
            node.setup();

            if !node.has_predecessors() {
                entries.push(Arc::clone(node));
            }
        }
    }
}
