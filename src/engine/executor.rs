// src/engine/executor.rs

//! The scheduler/executor core: discovers ready vertices, dispatches them to
//! the worker pool through kind-specific invokers, and propagates completion
//! until every graph handed to `run` is quiescent.

use std::backtrace::Backtrace;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error};

use crate::dag::graph::Graph;
use crate::dag::node::{Node, NodeKind, NodeState, Payload};
use crate::engine::counter::WaitGroup;
use crate::engine::pool::WorkerPool;
use crate::engine::queue::WorkQueue;
use crate::errors::{FlowdagError, Result};
use crate::flow::Flow;
use crate::profile::{Profiler, Span};

/// Runs task graphs on a bounded pool of worker threads.
///
/// Each `run` gets its own dispatcher thread; subflow dispatchers run inside
/// the worker slot executing the subflow vertex. Because of that, the pool
/// must have at least `max subflow nesting depth + 1` slots or a deeply
/// nested graph can deadlock waiting for a free worker.
pub struct Executor {
    core: Arc<Core>,
}

struct Core {
    pool: WorkerPool,
    queue: WorkQueue<Arc<Node>>,
    wait: WaitGroup,
    profiler: Profiler,
}

impl Executor {
    /// Create an executor with `concurrency` worker threads.
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(FlowdagError::ZeroConcurrency);
        }
        Ok(Self {
            core: Arc::new(Core {
                pool: WorkerPool::new(concurrency)?,
                queue: WorkQueue::new(),
                wait: WaitGroup::new(),
                profiler: Profiler::new(),
            }),
        })
    }

    /// Start scheduling `flow`. Non-blocking: entries are enqueued and the
    /// graph is driven by a dedicated dispatcher thread; call [`wait`] to
    /// block until it (and every other run on this executor) is done.
    ///
    /// A flow must not be run concurrently with itself; re-running it after
    /// `wait` is fine and starts from a fresh `setup`.
    ///
    /// [`wait`]: Executor::wait
    pub fn run(&self, flow: &Flow) -> &Self {
        let graph = Arc::clone(flow.graph());
        let core = Arc::clone(&self.core);

        // The dispatcher holds a wait-group slot of its own, so `wait`
        // cannot observe zero before the entries have been scheduled.
        core.wait.add(1);
        thread::Builder::new()
            .name(format!("flowdag-dispatch-{}", graph.name()))
            .spawn(move || {
                core.schedule_graph(&graph, None);
                core.wait.done();
            })
            .expect("failed to spawn dispatcher thread");

        self
    }

    /// Block until every run started on this executor has completed.
    pub fn wait(&self) {
        self.core.wait.wait();
    }

    /// Write the accumulated profile as collapsed-stack flame-graph text.
    /// Only meaningful after [`wait`](Executor::wait) has returned.
    pub fn profile<W: Write>(&self, w: &mut W) -> Result<()> {
        self.core.profiler.draw(w)?;
        Ok(())
    }
}

impl Core {
    /// Set a graph up, seed its entries in priority order, and drive its
    /// scheduler loop on the current thread until the graph is quiescent or
    /// cancelled.
    fn schedule_graph(self: &Arc<Self>, graph: &Arc<Graph>, parent_span: Option<&Arc<Span>>) {
        graph.setup();
        graph.set_parent_span(parent_span.map(Arc::clone));

        let mut entries = graph.entries();
        entries.sort_by_key(|n| n.priority());
        debug!(graph = %graph.name(), entries = entries.len(), "scheduling graph");

        self.schedule(&entries);
        self.invoke_graph(graph);

        graph.sched().broadcast();
    }

    /// Enqueue vertices whose dependencies are satisfied (or that were
    /// explicitly selected by a condition branch).
    fn schedule(&self, nodes: &[Arc<Node>]) {
        for node in nodes {
            let graph = node.graph();
            if graph.is_cancelled() {
                graph.sched().signal();
                debug!(
                    vertex = %node.name(),
                    graph = %graph.name(),
                    "not scheduled, graph is cancelled"
                );
                continue;
            }
            if !node.mark_waiting() {
                debug!(
                    vertex = %node.name(),
                    graph = %graph.name(),
                    "already enqueued by a sibling completion"
                );
                continue;
            }

            graph.join_incr();
            self.wait.add(1);
            self.queue.push(Arc::clone(node));
            graph.sched().signal();
        }
    }

    /// The scheduler loop. Parks on the graph's scheduling condition while
    /// the graph is live but nothing is enqueued; exits once the graph has
    /// drained or its run was cancelled.
    fn invoke_graph(self: &Arc<Self>, graph: &Arc<Graph>) {
        loop {
            {
                let mut guard = graph.sched().lock();
                while graph.join_counter() != 0
                    && self.queue.is_empty()
                    && !graph.is_cancelled()
                {
                    graph.sched().wait(&mut guard);
                }
            }

            if graph.join_counter() == 0 {
                break;
            }
            if graph.is_cancelled() {
                self.drain_abandoned();
                break;
            }

            // The queue is shared across runs: another dispatcher may have
            // taken the element we were woken for. Re-park rather than block
            // on the queue itself, so completion signals can still reach us.
            let Some(node) = self.queue.try_take() else {
                continue;
            };
            self.invoke_node(&node);
        }
    }

    /// Flush queue entries left behind by a cancelled run: their payloads
    /// are not invoked, but their bookkeeping (graph join-counter, wait
    /// group, signal) still completes so `wait` always returns. Entries
    /// belonging to other, still-live runs on this executor are dispatched
    /// normally.
    fn drain_abandoned(self: &Arc<Self>) {
        while let Some(node) = self.queue.try_take() {
            let owner = node.graph();
            if owner.is_cancelled() {
                debug!(
                    vertex = %node.name(),
                    graph = %owner.name(),
                    state = ?node.state(),
                    "abandoning queued vertex of cancelled run"
                );
                owner.join_decr();
                self.wait.done();
                owner.sched().signal();
            } else {
                self.invoke_node(&node);
            }
        }
    }

    /// Completion bookkeeping shared by static and subflow vertices: gather
    /// successors that became ready (or are condition vertices, which are
    /// always dispatchable), enqueue them in priority order, and re-arm the
    /// finished vertex for a potential later loop iteration.
    fn schedule_successors(&self, node: &Arc<Node>) {
        let mut candidates: Vec<Arc<Node>> = node
            .successors()
            .into_iter()
            .filter(|s| s.join_counter() == 0 || s.kind() == NodeKind::Condition)
            .collect();
        candidates.sort_by_key(|n| n.priority());

        node.setup();
        self.schedule(&candidates);
    }

    fn invoke_node(self: &Arc<Self>, node: &Arc<Node>) {
        let core = Arc::clone(self);
        let node = Arc::clone(node);
        match node.kind() {
            NodeKind::Static => self
                .pool
                .submit(Box::new(move || static_invoker(core, node))),
            NodeKind::Subflow => self
                .pool
                .submit(Box::new(move || subflow_invoker(core, node))),
            NodeKind::Condition => self
                .pool
                .submit(Box::new(move || condition_invoker(core, node))),
        }
    }
}

/// Execute one static vertex on a worker and perform its completion
/// bookkeeping, panic or not.
fn static_invoker(core: Arc<Core>, node: Arc<Node>) {
    let graph = node.graph();
    let span = Span::begin(NodeKind::Static, node.name(), graph.parent_span().as_ref());

    let result = catch_unwind(AssertUnwindSafe(|| {
        node.set_state(NodeState::Running);
        match node.payload() {
            Payload::Static(f) => f(),
            _ => unreachable!("static invoker dispatched for a non-static vertex"),
        }
        node.set_state(NodeState::Finished);
    }));
    span.finish();

    match result {
        Ok(()) => core.profiler.add(Arc::clone(&span)),
        Err(payload) => {
            node.set_state(NodeState::Failed);
            graph.cancel();
            error!(
                vertex = %node.name(),
                graph = %graph.name(),
                panic = %panic_message(payload.as_ref()),
                backtrace = %Backtrace::capture(),
                "recovered panic in task"
            );
        }
    }

    node.drop_successors();
    core.schedule_successors(&node);
    graph.join_decr();
    core.wait.done();
    graph.sched().signal();
}

/// Execute one subflow vertex: instancelize its embedded graph on first
/// execution, then drive that graph to quiescence on this worker before
/// releasing the vertex's own successors.
fn subflow_invoker(core: Arc<Core>, node: Arc<Node>) {
    let graph = node.graph();
    let span = Span::begin(NodeKind::Subflow, node.name(), graph.parent_span().as_ref());

    let sub = match node.payload() {
        Payload::Subflow { graph, .. } => Arc::clone(graph),
        _ => unreachable!("subflow invoker dispatched for a non-subflow vertex"),
    };

    let result = catch_unwind(AssertUnwindSafe(|| {
        node.set_state(NodeState::Running);
        if !sub.is_instancelized() {
            let Payload::Subflow { builder, .. } = node.payload() else {
                unreachable!("subflow invoker dispatched for a non-subflow vertex");
            };
            let mut flow = Flow::from_graph(Arc::clone(&sub));
            builder(&mut flow);
            sub.set_instancelized();
        }
        node.set_state(NodeState::Finished);
    }));
    span.finish();

    let builder_panicked = result.is_err();
    match result {
        Ok(()) => core.profiler.add(Arc::clone(&span)),
        Err(payload) => {
            node.set_state(NodeState::Failed);
            graph.cancel();
            sub.cancel();
            error!(
                vertex = %node.name(),
                graph = %graph.name(),
                panic = %panic_message(payload.as_ref()),
                backtrace = %Backtrace::capture(),
                "recovered panic in subflow builder"
            );
        }
    }

    if !builder_panicked {
        // The sub-graph runs to quiescence here, on this worker slot, with
        // this span as the parent of everything it dispatches. A panic
        // anywhere inside it latches the sub-graph's cancellation, which
        // must spread to the outer graph.
        core.schedule_graph(&sub, Some(&span));
        if sub.is_cancelled() {
            graph.cancel();
        }
    }

    node.drop_successors();
    core.schedule_successors(&node);
    graph.join_decr();
    core.wait.done();
    graph.sched().signal();
}

/// Execute one condition vertex: ask the payload for a branch index and
/// enqueue exactly that successor. Condition vertices never release
/// dependency credit (`drop`), and re-arm themselves immediately so branch
/// loops can re-enter them.
fn condition_invoker(core: Arc<Core>, node: Arc<Node>) {
    let graph = node.graph();
    let span = Span::begin(NodeKind::Condition, node.name(), graph.parent_span().as_ref());

    let result = catch_unwind(AssertUnwindSafe(|| {
        node.set_state(NodeState::Running);
        let choice = match node.payload() {
            Payload::Condition(f) => f(),
            _ => unreachable!("condition invoker dispatched for a non-condition vertex"),
        };
        let branches = node.successor_count();
        if choice >= branches {
            panic!(
                "condition '{}' chose branch {choice} but has only {branches} successors",
                node.name()
            );
        }
        node.set_state(NodeState::Finished);
        // Re-arm this vertex before the branch is released: a loop edge can
        // come back through here as soon as the branch finishes. Then
        // enqueue the chosen branch before this vertex's completion is
        // counted, so the dispatcher cannot observe a drained graph in
        // between and exit early.
        node.setup();
        core.schedule(&[node.successor(choice)]);
    }));
    span.finish();

    match result {
        Ok(()) => core.profiler.add(Arc::clone(&span)),
        Err(payload) => {
            node.set_state(NodeState::Failed);
            graph.cancel();
            error!(
                vertex = %node.name(),
                graph = %graph.name(),
                panic = %panic_message(payload.as_ref()),
                backtrace = %Backtrace::capture(),
                "recovered panic in condition"
            );
        }
    }

    graph.join_decr();
    core.wait.done();
    graph.sched().signal();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
