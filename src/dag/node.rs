// src/dag/node.rs

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::dag::graph::Graph;
use crate::engine::counter::Counter;
use crate::flow::Flow;

/// Scheduling priority of a vertex. Lower dispatches earlier among siblings
/// that become ready at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    High = 0,
    #[default]
    Normal = 1,
    Low = 2,
}

impl Priority {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Priority::High,
            2 => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Static,
    Condition,
    Subflow,
}

impl NodeKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            NodeKind::Static => "static",
            NodeKind::Condition => "condition",
            NodeKind::Subflow => "subflow",
        }
    }
}

/// Runtime state of a vertex within one run.
///
/// Forward-only within a run: idle → waiting → running → finished/failed.
/// `setup` takes a vertex back to idle for the next run (or the next loop
/// iteration through a condition edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum NodeState {
    Idle = 0,
    Waiting = 1,
    Running = 2,
    Finished = 3,
    Failed = 4,
}

impl NodeState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => NodeState::Waiting,
            2 => NodeState::Running,
            3 => NodeState::Finished,
            4 => NodeState::Failed,
            _ => NodeState::Idle,
        }
    }
}

/// Kind-specific vertex payload, matched once at invoke time.
pub(crate) enum Payload {
    Static(Box<dyn Fn() + Send + Sync>),
    Condition(Box<dyn Fn() -> usize + Send + Sync>),
    Subflow {
        graph: Arc<Graph>,
        builder: Box<dyn Fn(&mut Flow) + Send + Sync>,
    },
}

impl Payload {
    fn kind(&self) -> NodeKind {
        match self {
            Payload::Static(_) => NodeKind::Static,
            Payload::Condition(_) => NodeKind::Condition,
            Payload::Subflow { .. } => NodeKind::Subflow,
        }
    }
}

/// A vertex of the execution graph.
///
/// Identity and topology are fixed once the graph is built; everything the
/// scheduler mutates at run time (state, join-counter, priority) is atomic,
/// so invokers and the dispatcher share vertices behind plain `Arc`s.
pub(crate) struct Node {
    name: String,
    payload: Payload,
    kind: NodeKind,
    priority: AtomicU8,
    state: AtomicU8,
    join: Counter,
    successors: RwLock<Vec<Arc<Node>>>,
    // Weak back-edges: the graph's vertex list keeps every node alive, and
    // strong predecessor links would form reference cycles with `successors`.
    predecessors: RwLock<Vec<Weak<Node>>>,
    graph: Weak<Graph>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, payload: Payload, graph: &Arc<Graph>) -> Arc<Self> {
        let kind = payload.kind();
        Arc::new(Self {
            name: name.into(),
            payload,
            kind,
            priority: AtomicU8::new(Priority::Normal as u8),
            state: AtomicU8::new(NodeState::Idle as u8),
            join: Counter::new(),
            successors: RwLock::new(Vec::new()),
            predecessors: RwLock::new(Vec::new()),
            graph: Arc::downgrade(graph),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }

    pub(crate) fn priority(&self) -> Priority {
        Priority::from_u8(self.priority.load(Ordering::SeqCst))
    }

    pub(crate) fn set_priority(&self, priority: Priority) {
        self.priority.store(priority as u8, Ordering::SeqCst);
    }

    pub(crate) fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Claim this vertex for enqueueing. Two predecessors finishing at the
    /// same instant can both observe the join-counter at zero; the
    /// idle→waiting transition is the arbiter that keeps the vertex from
    /// being enqueued twice in one run.
    pub(crate) fn mark_waiting(&self) -> bool {
        self.state
            .compare_exchange(
                NodeState::Idle as u8,
                NodeState::Waiting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub(crate) fn join_counter(&self) -> i64 {
        self.join.value()
    }

    pub(crate) fn join_decr(&self) {
        self.join.decr();
    }

    pub(crate) fn reset_join(&self) {
        self.join.set(0);
    }

    /// The owning graph. Vertices never outlive their graph: the graph's
    /// vertex list holds them, and the executor's `wait` keeps the graph
    /// alive for the duration of a run.
    pub(crate) fn graph(&self) -> Arc<Graph> {
        self.graph
            .upgrade()
            .expect("vertex used after its graph was dropped")
    }

    pub(crate) fn successors(&self) -> Vec<Arc<Node>> {
        self.successors.read().clone()
    }

    pub(crate) fn successor_count(&self) -> usize {
        self.successors.read().len()
    }

    pub(crate) fn successor(&self, index: usize) -> Arc<Node> {
        self.successors.read()[index].clone()
    }

    pub(crate) fn has_predecessors(&self) -> bool {
        !self.predecessors.read().is_empty()
    }

    /// Declare a happens-before edge: `self` runs before `other`.
    pub(crate) fn precede(self: &Arc<Self>, other: &Arc<Node>) {
        assert!(
            !Arc::ptr_eq(self, other),
            "vertex '{}' cannot precede itself",
            self.name
        );
        self.successors.write().push(Arc::clone(other));
        other.predecessors.write().push(Arc::downgrade(self));
    }

    /// Reset per-run state: idle, and a join-counter equal to the number of
    /// non-condition predecessors. Condition predecessors owe their
    /// successors no dependency credit; that is what lets an unselected
    /// branch stay runnable and a selected branch loop back.
    pub(crate) fn setup(&self) {
        self.set_state(NodeState::Idle);
        for pred in self.predecessors.read().iter() {
            let Some(pred) = pred.upgrade() else {
                continue;
            };
            if pred.kind == NodeKind::Condition {
                continue;
            }
            self.join.incr();
        }
    }

    /// Release this vertex's completed edge into each successor.
    ///
    /// Condition vertices skip this entirely: their successors were never
    /// counted as depending on them (see [`setup`]).
    pub(crate) fn drop_successors(&self) {
        if self.kind == NodeKind::Condition {
            return;
        }
        for succ in self.successors.read().iter() {
            succ.join_decr();
        }
    }
}
