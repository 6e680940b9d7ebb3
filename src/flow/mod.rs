// src/flow/mod.rs

//! The builder surface: construct a [`Flow`] out of named tasks, wire
//! happens-before edges between their handles, then hand the flow to an
//! [`Executor`](crate::Executor).

mod validate;

use std::sync::Arc;

use crate::dag::graph::Graph;
use crate::dag::node::{Node, Payload};
use crate::errors::Result;

pub use crate::dag::node::Priority;

/// A named, reusable task graph under construction (or between runs).
///
/// Cloning handles is cheap; the flow owns the graph, the executor only
/// borrows it for the duration of a run.
pub struct Flow {
    graph: Arc<Graph>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(name),
        }
    }

    /// Wrap an existing graph; used when a subflow builder populates the
    /// embedded graph at first execution.
    pub(crate) fn from_graph(graph: Arc<Graph>) -> Self {
        Self { graph }
    }

    pub(crate) fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn name(&self) -> &str {
        self.graph.name()
    }

    /// Add a static task: a plain callable with no return value.
    pub fn task<F>(&mut self, name: impl Into<String>, f: F) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push(name, Payload::Static(Box::new(f)))
    }

    /// Add a condition task. The callable picks which successor runs next by
    /// index; returning an index past the successor list cancels the run.
    pub fn condition<F>(&mut self, name: impl Into<String>, f: F) -> TaskHandle
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        self.push(name, Payload::Condition(Box::new(f)))
    }

    /// Add a subflow task: a nested flow populated by `builder` the first
    /// time the task executes, and reused as-is on later runs.
    pub fn subflow<F>(&mut self, name: impl Into<String>, builder: F) -> TaskHandle
    where
        F: Fn(&mut Flow) + Send + Sync + 'static,
    {
        let name = name.into();
        let sub = Graph::new(name.clone());
        self.push(
            name,
            Payload::Subflow {
                graph: sub,
                builder: Box::new(builder),
            },
        )
    }

    /// True if the last run of this flow was cancelled by a panic somewhere
    /// in it (or in one of its subflows). Reset by the next run.
    pub fn cancelled(&self) -> bool {
        self.graph.is_cancelled()
    }

    /// Check the flow for dependency cycles. Branch edges out of condition
    /// tasks are selections rather than dependencies and may legally loop,
    /// so they are not part of the check.
    pub fn validate(&self) -> Result<()> {
        validate::validate_graph(&self.graph)
    }

    fn push(&mut self, name: impl Into<String>, payload: Payload) -> TaskHandle {
        let node = Node::new(name, payload, &self.graph);
        self.graph.push(Arc::clone(&node));
        TaskHandle { node }
    }
}

/// Handle to a task inside a [`Flow`]; used to wire edges and priorities.
#[derive(Clone)]
pub struct TaskHandle {
    node: Arc<Node>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// `self` happens before `other`.
    ///
    /// Panics if asked to make a task precede itself.
    pub fn precede(&self, other: &TaskHandle) -> &Self {
        self.node.precede(&other.node);
        self
    }

    /// `self` happens after `other`.
    pub fn succeed(&self, other: &TaskHandle) -> &Self {
        other.node.precede(&self.node);
        self
    }

    pub fn set_priority(&self, priority: Priority) -> &Self {
        self.node.set_priority(priority);
        self
    }
}
