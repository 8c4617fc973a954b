//! Disorder scoring - a normalized structural "entropy" of a graph.
//!
//! The score combines five structural signals. Isolation and fragmentation
//! carry the most weight because connectedness is what the engine rewards:
//!
//! | signal                                   | weight |
//! |------------------------------------------|--------|
//! | isolated-node fraction                   | 0.25   |
//! | extra components beyond one              | 0.20   |
//! | inverse mean degree (capped at 4)        | 0.20   |
//! | one minus average clustering             | 0.20   |
//! | normalized mean path length, largest CC  | 0.15   |
//!
//! Graphs with fewer than two nodes carry no structure and score 0.

mod topology;

pub use topology::*;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const ISOLATION_WEIGHT: f64 = 0.25;
pub const FRAGMENTATION_WEIGHT: f64 = 0.20;
pub const SPARSITY_WEIGHT: f64 = 0.20;
pub const CLUSTERING_WEIGHT: f64 = 0.20;
pub const PATH_WEIGHT: f64 = 0.15;

/// Mean degree at which the sparsity signal reaches zero.
pub const DEGREE_CAP: f64 = 4.0;

/// Raw structural measurements of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralMetrics {
    pub nodes: usize,
    pub edges: usize,
    pub isolates: usize,
    pub components: usize,
    pub avg_degree: f64,
    pub clustering: f64,
    pub largest_size: usize,
    /// Mean shortest path length inside the largest component, if it has
    /// at least two nodes.
    pub avg_path_len: Option<f64>,
}

impl StructuralMetrics {
    /// Normalized signals in weight order, each in `[0, 1]`.
    pub fn signals(&self) -> [f64; 5] {
        let n = self.nodes.max(1) as f64;
        let isolation = self.isolates as f64 / n;
        let fragmentation =
            self.components.saturating_sub(1) as f64 / (self.nodes.saturating_sub(1).max(1)) as f64;
        let sparsity = 1.0 - (self.avg_degree / DEGREE_CAP).min(1.0);
        let looseness = 1.0 - self.clustering;
        let path = match self.avg_path_len {
            Some(apl) if self.largest_size > 1 => {
                ((apl - 1.0) / (self.largest_size - 1).max(1) as f64).clamp(0.0, 1.0)
            }
            _ => 1.0,
        };
        [isolation, fragmentation, sparsity, looseness, path]
    }

    /// Weighted score in `[0, 1]`.
    pub fn score(&self) -> f64 {
        if self.nodes < 2 {
            return 0.0;
        }
        let weights = [
            ISOLATION_WEIGHT,
            FRAGMENTATION_WEIGHT,
            SPARSITY_WEIGHT,
            CLUSTERING_WEIGHT,
            PATH_WEIGHT,
        ];
        let total: f64 = weights
            .iter()
            .zip(self.signals())
            .map(|(weight, signal)| weight * signal)
            .sum();
        total.clamp(0.0, 1.0)
    }
}

/// Measure the structural features of `topology`.
pub fn analyse(topology: &Topology) -> StructuralMetrics {
    let n = topology.node_count();
    let degrees = topology.degrees();
    let isolates = degrees.iter().filter(|d| **d == 0).count();
    let avg_degree = if n > 0 {
        degrees.iter().sum::<usize>() as f64 / n as f64
    } else {
        0.0
    };

    let neighbors = topology.undirected_neighbors();
    let clustering = if n > 1 {
        average_clustering(&neighbors)
    } else {
        0.0
    };

    let components = topology.components();
    let mut largest: &[usize] = &[];
    for component in &components {
        if component.len() > largest.len() {
            largest = component;
        }
    }
    let avg_path_len = if largest.len() > 1 {
        average_path_length(&neighbors, largest)
    } else {
        None
    };

    StructuralMetrics {
        nodes: n,
        edges: topology.edge_count(),
        isolates,
        components: components.len(),
        avg_degree,
        clustering,
        largest_size: largest.len(),
        avg_path_len,
    }
}

/// Normalized disorder score of `topology` in `[0, 1]`. Pure and deterministic.
pub fn score(topology: &Topology) -> f64 {
    analyse(topology).score()
}

/// Human-readable explanation of the score.
pub fn explain(topology: &Topology) -> String {
    let metrics = analyse(topology);
    let mut parts = vec![
        format!("The graph has {} nodes and {} edges.", metrics.nodes, metrics.edges),
        format!("Mean degree: {:.2}.", metrics.avg_degree),
        format!("{} isolated nodes.", metrics.isolates),
        format!("{} connected components.", metrics.components),
        format!("Clustering coefficient: {:.2}.", metrics.clustering),
    ];
    if let Some(apl) = metrics.avg_path_len {
        parts.push(format!("Mean path length in the largest component: {:.2}.", apl));
    }
    parts.push(format!("Resulting entropy: {:.2}.", metrics.score()));
    parts.join(" ")
}

fn average_clustering(neighbors: &[std::collections::BTreeSet<usize>]) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    let total: f64 = neighbors
        .iter()
        .map(|adjacent| {
            let k = adjacent.len();
            if k < 2 {
                return 0.0;
            }
            let members: Vec<usize> = adjacent.iter().copied().collect();
            let mut links = 0usize;
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    if neighbors[members[i]].contains(&members[j]) {
                        links += 1;
                    }
                }
            }
            links as f64 / (k * (k - 1) / 2) as f64
        })
        .sum();
    total / neighbors.len() as f64
}

fn average_path_length(
    neighbors: &[std::collections::BTreeSet<usize>],
    component: &[usize],
) -> Option<f64> {
    let size = component.len();
    if size < 2 {
        return None;
    }

    let mut total = 0usize;
    let mut distance = vec![usize::MAX; neighbors.len()];
    for &source in component {
        distance.iter_mut().for_each(|d| *d = usize::MAX);
        distance[source] = 0;
        let mut queue = VecDeque::from([source]);
        while let Some(node) = queue.pop_front() {
            for &next in &neighbors[node] {
                if distance[next] == usize::MAX {
                    distance[next] = distance[node] + 1;
                    total += distance[next];
                    queue.push_back(next);
                }
            }
        }
    }

    Some(total as f64 / (size * (size - 1)) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_and_single_node_score_zero() {
        assert_eq!(score(&Topology::new(0)), 0.0);
        assert_eq!(score(&Topology::new(1)), 0.0);
    }

    #[test]
    fn test_fully_isolated_pair_is_maximal() {
        assert!(approx(score(&Topology::new(2)), 1.0));
    }

    #[test]
    fn test_single_edge() {
        // isolation 0, fragmentation 0, sparsity 0.75, looseness 1.0, path 0
        let topology = Topology::with_edges(2, [(0, 1)]);
        assert!(approx(score(&topology), 0.35));
    }

    #[test]
    fn test_closing_edge_does_not_raise_entropy() {
        let one_way = Topology::with_edges(2, [(0, 1)]);
        let both_ways = Topology::with_edges(2, [(0, 1), (1, 0)]);
        assert!(score(&both_ways) <= score(&one_way));
        assert!(approx(score(&both_ways), 0.3));
    }

    #[test]
    fn test_triangle_beats_path() {
        let path = Topology::with_edges(3, [(0, 1), (1, 2)]);
        let triangle = Topology::with_edges(3, [(0, 1), (1, 2), (2, 0)]);

        let path_metrics = analyse(&path);
        assert!(approx(path_metrics.avg_path_len.unwrap_or_default(), 4.0 / 3.0));
        assert!(approx(path_metrics.clustering, 0.0));

        let triangle_metrics = analyse(&triangle);
        assert!(approx(triangle_metrics.clustering, 1.0));
        assert!(approx(triangle_metrics.score(), 0.1));

        assert!(score(&triangle) < score(&path));
    }

    #[test]
    fn test_isolated_node_raises_entropy() {
        let connected = Topology::with_edges(3, [(0, 1), (1, 2), (2, 0)]);
        let with_isolate = Topology::with_edges(4, [(0, 1), (1, 2), (2, 0)]);
        let metrics = analyse(&with_isolate);
        assert_eq!(metrics.isolates, 1);
        assert_eq!(metrics.components, 2);
        assert_eq!(metrics.largest_size, 3);
        assert!(score(&with_isolate) > score(&connected));
    }

    #[test]
    fn test_score_stays_in_range() {
        let dense = Topology::with_edges(
            4,
            (0..4).flat_map(|a| (0..4).map(move |b| (a, b))),
        );
        let sparse = Topology::with_edges(10, [(0, 1)]);
        for topology in [dense, sparse, Topology::new(7)] {
            let value = score(&topology);
            assert!((0.0..=1.0).contains(&value), "score {} out of range", value);
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let topology = Topology::with_edges(6, [(0, 1), (1, 2), (3, 4), (4, 5), (5, 3)]);
        assert_eq!(score(&topology), score(&topology));
    }

    #[test]
    fn test_explain_mentions_score() {
        let topology = Topology::with_edges(2, [(0, 1)]);
        let text = explain(&topology);
        assert!(text.contains("2 nodes"));
        assert!(text.contains("Resulting entropy: 0.35"));
    }
}
