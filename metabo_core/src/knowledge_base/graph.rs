//! Knowledge Graph - the core data structure for concept memory.

use chrono::Utc;
use metabo_rules::{edit_similarity, Topology};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::{
    normalize_label, ConceptNode, EdgeKind, NodeKind, Provenance, RelationEdge, Triple,
    GOAL_TRANSITION,
};

type EdgeKey = (String, String, String);

/// A label that was folded into an existing, similar label during a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelResolution {
    pub requested: String,
    pub resolved: String,
    pub similarity: f64,
}

/// What a merge did to the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Triples as stored, after normalization and label resolution.
    pub merged: Vec<Triple>,
    pub inserted_edges: usize,
    pub duplicate_edges: usize,
    pub new_nodes: usize,
    /// Nodes whose tag sets grew.
    pub updated_nodes: usize,
    pub resolved: Vec<LabelResolution>,
    /// Malformed triples that were skipped.
    pub dropped: Vec<Triple>,
}

impl MergeReport {
    /// Check if the merge changed the graph.
    pub fn changed(&self) -> bool {
        self.inserted_edges > 0 || self.new_nodes > 0 || self.updated_nodes > 0
    }
}

/// The main knowledge graph structure.
///
/// Nodes are keyed by normalized label. Edges keep insertion order and are
/// unique per (subject, relation, object).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, ConceptNode>,

    edges: Vec<RelationEdge>,

    /// Index: triple key -> position in `edges`.
    edge_index: HashMap<EdgeKey, usize>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or union its tags into the existing node with the same label.
    ///
    /// Returns true if the graph changed.
    pub fn upsert_node(&mut self, node: ConceptNode) -> bool {
        let node = ConceptNode {
            label: normalize_label(&node.label),
            ..node
        };
        if node.label.is_empty() {
            return false;
        }
        match self.nodes.get_mut(&node.label) {
            Some(existing) => existing.absorb(node),
            None => {
                self.nodes.insert(node.label.clone(), node);
                true
            }
        }
    }

    /// Insert an edge if its triple is not already present.
    ///
    /// Missing endpoints are created untagged. Returns true if inserted.
    pub fn insert_edge(&mut self, edge: RelationEdge) -> bool {
        let key = (
            edge.subject.clone(),
            edge.relation.clone(),
            edge.object.clone(),
        );
        if self.edge_index.contains_key(&key) {
            return false;
        }
        for label in [&edge.subject, &edge.object] {
            if !self.nodes.contains_key(label) {
                self.nodes.insert(label.clone(), ConceptNode::new(label));
            }
        }
        self.edge_index.insert(key, self.edges.len());
        self.edges.push(edge);
        true
    }

    /// Idempotently merge `triples`, tagging every endpoint with `kind` and `source`.
    ///
    /// With `fuzzy_threshold` set, a label whose edit similarity to an existing
    /// label exceeds the threshold resolves to that label; each such decision is
    /// reported. Malformed triples are dropped and the rest proceed.
    pub fn merge(
        &mut self,
        triples: &[Triple],
        kind: NodeKind,
        source: Provenance,
        fuzzy_threshold: Option<f64>,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        let now = Utc::now();

        for triple in triples {
            let Some(normalized) = triple.normalized() else {
                log::debug!("[graph] Dropping malformed triple {}", triple);
                report.dropped.push(triple.clone());
                continue;
            };

            let (mut subject, subject_resolution) =
                self.resolve_label(&normalized.subject, fuzzy_threshold);
            let (mut object, object_resolution) =
                self.resolve_label(&normalized.object, fuzzy_threshold);
            if subject == object && normalized.subject != normalized.object {
                // Resolution must not fold two distinct labels into a self-loop.
                log::debug!(
                    "[graph] Keeping labels of {} apart, resolution would form a self-loop",
                    normalized
                );
                subject = normalized.subject.clone();
                object = normalized.object.clone();
            } else {
                for resolution in [subject_resolution, object_resolution].into_iter().flatten() {
                    log::debug!(
                        "[graph] Resolved label '{}' to '{}' (similarity {:.2})",
                        resolution.requested,
                        resolution.resolved,
                        resolution.similarity
                    );
                    report.resolved.push(resolution);
                }
            }

            for label in [&subject, &object] {
                let existed = self.nodes.contains_key(label);
                let changed = self.upsert_node(
                    ConceptNode::new(label)
                        .with_kind(kind.clone())
                        .with_source(source.clone()),
                );
                if !existed {
                    report.new_nodes += 1;
                } else if changed {
                    report.updated_nodes += 1;
                }
            }

            let stored = Triple::new(subject, normalized.relation, object);
            let edge = RelationEdge::from_triple(stored.clone(), source.clone()).with_timestamp(now);
            if self.insert_edge(edge) {
                report.inserted_edges += 1;
            } else {
                report.duplicate_edges += 1;
            }
            report.merged.push(stored);
        }

        report
    }

    fn resolve_label(
        &self,
        label: &str,
        fuzzy_threshold: Option<f64>,
    ) -> (String, Option<LabelResolution>) {
        if self.nodes.contains_key(label) {
            return (label.to_string(), None);
        }
        let Some(threshold) = fuzzy_threshold else {
            return (label.to_string(), None);
        };

        let mut best: Option<(&str, f64)> = None;
        for existing in self.nodes.keys() {
            let similarity = edit_similarity(label, existing);
            if similarity > threshold && best.map_or(true, |(_, s)| similarity > s) {
                best = Some((existing, similarity));
            }
        }

        match best {
            Some((existing, similarity)) => (
                existing.to_string(),
                Some(LabelResolution {
                    requested: label.to_string(),
                    resolved: existing.to_string(),
                    similarity,
                }),
            ),
            None => (label.to_string(), None),
        }
    }

    /// Merge every node and edge of `other` into this graph.
    ///
    /// Nodes without a type tag get `default_kind`, nodes without provenance
    /// get `source`. Labels are taken as they are; no fuzzy resolution.
    pub fn merge_graph(
        &mut self,
        other: &KnowledgeGraph,
        default_kind: NodeKind,
        source: Provenance,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for node in other.nodes() {
            let mut node = node.clone();
            if node.kinds.is_empty() {
                node.kinds.insert(default_kind.clone());
            }
            if node.sources.is_empty() {
                node.sources.insert(source.clone());
            }
            let existed = self.nodes.contains_key(&node.label);
            if self.upsert_node(node) {
                if existed {
                    report.updated_nodes += 1;
                } else {
                    report.new_nodes += 1;
                }
            }
        }

        for edge in other.edges() {
            let triple = edge.triple();
            if self.insert_edge(edge.clone()) {
                report.inserted_edges += 1;
            } else {
                report.duplicate_edges += 1;
            }
            report.merged.push(triple);
        }

        log::debug!(
            "[graph] Merged graph: {} new nodes, {} new edges",
            report.new_nodes,
            report.inserted_edges
        );
        report
    }

    /// Add a lone goal node. Returns true if the graph changed.
    pub fn add_goal(&mut self, goal: &str) -> bool {
        self.upsert_node(
            ConceptNode::new(goal)
                .with_kind(NodeKind::Goal)
                .with_source(Provenance::System)
                .with_text(goal.trim()),
        )
    }

    /// Record a transition between two goals, tagging both as goals.
    ///
    /// Returns false if the transition already existed.
    pub fn goal_transition(&mut self, previous: &str, next: &str) -> bool {
        let previous = normalize_label(previous);
        let next = normalize_label(next);
        if previous.is_empty() || next.is_empty() {
            return false;
        }
        let tagged_previous = self.add_goal(&previous);
        let tagged_next = self.add_goal(&next);
        let edge = RelationEdge::from_triple(
            Triple::new(previous, GOAL_TRANSITION, next),
            Provenance::System,
        )
        .with_kind(EdgeKind::GoalTransition)
        .with_timestamp(Utc::now());
        let inserted = self.insert_edge(edge);
        if !inserted && (tagged_previous || tagged_next) {
            log::debug!("[graph] Goal transition already present, goal tags updated");
        }
        inserted
    }

    /// Goals in transition order.
    ///
    /// Uses a topological order of the goal transition edges; if transitions
    /// form a cycle, falls back to depth-first order from the first goal.
    pub fn goal_path(&self) -> Vec<String> {
        let transitions: Vec<&RelationEdge> = self
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::GoalTransition)
            .collect();

        let mut order: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for edge in &transitions {
            for label in [edge.subject.as_str(), edge.object.as_str()] {
                if seen.insert(label) {
                    order.push(label);
                }
            }
        }
        for node in self.nodes.values().filter(|n| n.has_kind(&NodeKind::Goal)) {
            if seen.insert(node.label.as_str()) {
                order.push(node.label.as_str());
            }
        }
        if order.is_empty() {
            return Vec::new();
        }

        let mut incoming: HashMap<&str, usize> = order.iter().map(|l| (*l, 0)).collect();
        let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &transitions {
            *incoming.entry(edge.object.as_str()).or_default() += 1;
            outgoing
                .entry(edge.subject.as_str())
                .or_default()
                .push(edge.object.as_str());
        }

        let mut ready: VecDeque<&str> = order
            .iter()
            .copied()
            .filter(|l| incoming.get(l).copied().unwrap_or(0) == 0)
            .collect();
        let mut path = Vec::with_capacity(order.len());
        while let Some(label) = ready.pop_front() {
            path.push(label.to_string());
            for &next in outgoing.get(label).into_iter().flatten() {
                if let Some(count) = incoming.get_mut(next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }
        if path.len() == order.len() {
            return path;
        }

        // Cycle: depth-first preorder from the first goal.
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack = vec![order[0]];
        let mut preorder = Vec::new();
        while let Some(label) = stack.pop() {
            if !visited.insert(label) {
                continue;
            }
            preorder.push(label.to_string());
            if let Some(targets) = outgoing.get(label) {
                stack.extend(targets.iter().rev());
            }
        }
        preorder
    }

    /// Get a node by label.
    pub fn node(&self, label: &str) -> Option<&ConceptNode> {
        self.nodes.get(&normalize_label(label))
    }

    /// Check if a node exists.
    pub fn contains(&self, label: &str) -> bool {
        self.node(label).is_some()
    }

    /// Check if the exact triple is stored.
    pub fn has_edge(&self, subject: &str, relation: &str, object: &str) -> bool {
        self.edge_index.contains_key(&(
            normalize_label(subject),
            normalize_label(relation),
            normalize_label(object),
        ))
    }

    /// All nodes in label order.
    pub fn nodes(&self) -> impl Iterator<Item = &ConceptNode> {
        self.nodes.values()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[RelationEdge] {
        &self.edges
    }

    /// Nodes carrying a type tag.
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a NodeKind) -> impl Iterator<Item = &'a ConceptNode> {
        self.nodes.values().filter(move |n| n.has_kind(kind))
    }

    /// Edges touching `label` in either direction.
    pub fn edges_touching(&self, label: &str) -> Vec<&RelationEdge> {
        let label = normalize_label(label);
        self.edges.iter().filter(|e| e.touches(&label)).collect()
    }

    /// Distinct neighbors of `label`, ignoring direction.
    pub fn neighbors(&self, label: &str) -> Vec<&str> {
        let label = normalize_label(label);
        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for edge in self.edges.iter().filter(|e| e.touches(&label)) {
            let other = if edge.subject == label {
                edge.object.as_str()
            } else {
                edge.subject.as_str()
            };
            if other != label && seen.insert(other) {
                neighbors.push(other);
            }
        }
        neighbors
    }

    /// Number of edge endpoints at `label`.
    pub fn degree(&self, label: &str) -> usize {
        let label = normalize_label(label);
        self.edges
            .iter()
            .map(|e| usize::from(e.subject == label) + usize::from(e.object == label))
            .sum()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Integer-indexed view for structural scoring. Node ids follow label order.
    pub fn topology(&self) -> Topology {
        let ids: HashMap<&str, usize> = self
            .nodes
            .keys()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();
        Topology::with_edges(
            self.nodes.len(),
            self.edges
                .iter()
                .filter_map(|e| Some((*ids.get(e.subject.as_str())?, *ids.get(e.object.as_str())?))),
        )
    }

    fn from_parts(nodes: Vec<ConceptNode>, edges: Vec<RelationEdge>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.upsert_node(node);
        }
        for mut edge in edges {
            edge.subject = normalize_label(&edge.subject);
            edge.relation = normalize_label(&edge.relation);
            edge.object = normalize_label(&edge.object);
            if edge.subject.is_empty() || edge.relation.is_empty() || edge.object.is_empty() {
                continue;
            }
            graph.insert_edge(edge);
        }
        graph
    }
}

#[derive(Serialize)]
struct GraphView<'a> {
    nodes: Vec<&'a ConceptNode>,
    edges: &'a [RelationEdge],
}

#[derive(Deserialize)]
struct GraphData {
    #[serde(default)]
    nodes: Vec<ConceptNode>,
    #[serde(default)]
    edges: Vec<RelationEdge>,
}

impl Serialize for KnowledgeGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GraphView {
            nodes: self.nodes.values().collect(),
            edges: &self.edges,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KnowledgeGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let data = GraphData::deserialize(deserializer)?;
        Ok(Self::from_parts(data.nodes, data.edges))
    }
}
