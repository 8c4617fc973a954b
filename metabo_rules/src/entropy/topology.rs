//! Integer-indexed graph view used by the disorder scorer.

use std::collections::{BTreeSet, VecDeque};

/// A directed multigraph over nodes `0..node_count`.
///
/// Parallel edges and self-loops are kept so degree counts match the stored
/// graph; the undirected projection used for clustering and paths drops both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    node_count: usize,
    edges: Vec<(usize, usize)>,
}

impl Topology {
    /// Create a topology with `node_count` isolated nodes.
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
        }
    }

    /// Create a topology from a node count and directed edges.
    ///
    /// Edges referencing unknown nodes are ignored.
    pub fn with_edges(node_count: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut topology = Self::new(node_count);
        for (from, to) in edges {
            topology.add_edge(from, to);
        }
        topology
    }

    /// Add a directed edge. Returns false if either endpoint is out of range.
    pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
        if from >= self.node_count || to >= self.node_count {
            return false;
        }
        self.edges.push((from, to));
        true
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Total degree (in + out) of every node. A self-loop counts twice.
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.node_count];
        for &(from, to) in &self.edges {
            degrees[from] += 1;
            degrees[to] += 1;
        }
        degrees
    }

    /// Neighbor sets of the simple undirected projection.
    pub fn undirected_neighbors(&self) -> Vec<BTreeSet<usize>> {
        let mut neighbors = vec![BTreeSet::new(); self.node_count];
        for &(from, to) in &self.edges {
            if from != to {
                neighbors[from].insert(to);
                neighbors[to].insert(from);
            }
        }
        neighbors
    }

    /// Weakly connected components, each sorted, ordered by smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let neighbors = self.undirected_neighbors();
        let mut seen = vec![false; self.node_count];
        let mut components = Vec::new();

        for start in 0..self.node_count {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for &next in &neighbors[node] {
                    if !seen[next] {
                        seen[next] = true;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }

        components
    }
}
