// src/flow/validate.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::graph::Graph;
use crate::dag::node::{Node, NodeKind};
use crate::errors::{FlowdagError, Result};

/// Check the dependency edges of a built graph for cycles.
///
/// Edges out of condition vertices are excluded: they carry no dependency
/// credit (the scheduler never counts them in join-counters), and looping
/// back through a condition is a supported pattern, not a defect.
pub(crate) fn validate_graph(graph: &Arc<Graph>) -> Result<()> {
    let nodes = graph.nodes();

    let mut index: HashMap<*const Node, usize> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        index.insert(Arc::as_ptr(node), i);
    }

    let mut dep_graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..nodes.len() {
        dep_graph.add_node(i);
    }

    for (i, node) in nodes.iter().enumerate() {
        if node.kind() == NodeKind::Condition {
            continue;
        }
        for succ in node.successors() {
            if let Some(&j) = index.get(&Arc::as_ptr(&succ)) {
                dep_graph.add_edge(i, j, ());
            }
        }
    }

    match toposort(&dep_graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let name = nodes[cycle.node_id()].name().to_string();
            Err(FlowdagError::GraphCycle(name))
        }
    }
}
