//! Attribute dependency graph.
//!
//! Nodes are attributes (by declaration index), edges run from parent to
//! child. Ordering uses Kahn's algorithm with a min-heap on declaration
//! index, so attributes that do not constrain each other keep the order
//! they were declared in.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::ModelError;

/// Directed graph over attribute indices.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Create a graph with `count` attribute nodes and no edges.
    pub fn with_nodes(count: usize) -> Self {
        let mut graph = DiGraph::with_capacity(count, count);
        let nodes = (0..count).map(|i| graph.add_node(i)).collect();
        Self { graph, nodes }
    }

    /// Record that `child` depends on `parent`.
    pub fn add_edge(&mut self, parent: usize, child: usize) {
        self.graph.add_edge(self.nodes[parent], self.nodes[child], ());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Indices of the attributes `attr` depends on, deduplicated, ascending.
    pub fn parents(&self, attr: usize) -> Vec<usize> {
        self.neighbors(attr, Direction::Incoming)
    }

    /// Indices of the attributes depending on `attr`, deduplicated, ascending.
    pub fn children(&self, attr: usize) -> Vec<usize> {
        self.neighbors(attr, Direction::Outgoing)
    }

    fn neighbors(&self, attr: usize, dir: Direction) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(self.nodes[attr], dir)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Topological order of attribute indices.
    ///
    /// `names` is used only to report a cycle.
    pub fn topo_order(&self, names: &[String]) -> Result<Vec<usize>, ModelError> {
        let mut in_degree: Vec<usize> = self
            .nodes
            .iter()
            .map(|&n| self.graph.edges_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(next)) = ready.pop() {
            order.push(next);
            for child in self
                .graph
                .neighbors_directed(self.nodes[next], Direction::Outgoing)
            {
                let idx = self.graph[child];
                in_degree[idx] -= 1;
                if in_degree[idx] == 0 {
                    ready.push(Reverse(idx));
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(ModelError::CyclicDependency(self.cycle_members(names)))
        }
    }

    /// Attributes of the first strongly connected component that forms a
    /// cycle, in declaration order.
    fn cycle_members(&self, names: &[String]) -> Vec<String> {
        let mut members: Vec<usize> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| scc.into_iter().map(|n| self.graph[n]).collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
            .into_iter()
            .map(|i| names.get(i).cloned().unwrap_or_else(|| i.to_string()))
            .collect()
    }
}
