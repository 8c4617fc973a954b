//! Graph store - a knowledge graph with write-through JSON persistence.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

use super::{CycleInsight, KnowledgeGraph, MergeReport, NodeKind, Provenance, Triple};

/// Owns the knowledge graph and mirrors every change to disk.
///
/// Loading is tolerant: a missing file yields an empty graph, and an
/// unreadable or corrupt file is logged and replaced by an empty graph.
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: KnowledgeGraph,
    path: Option<PathBuf>,
    fuzzy_threshold: Option<f64>,
}

impl GraphStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            graph: KnowledgeGraph::new(),
            path: None,
            fuzzy_threshold: None,
        }
    }

    /// Open the store backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let graph = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<KnowledgeGraph>(&raw) {
                Ok(graph) => {
                    log::debug!(
                        "[graph] Loaded {} nodes and {} edges from {}",
                        graph.node_count(),
                        graph.edge_count(),
                        path.display()
                    );
                    graph
                }
                Err(e) => {
                    log::warn!("[graph] Corrupt graph file {}: {}, starting empty", path.display(), e);
                    KnowledgeGraph::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => KnowledgeGraph::new(),
            Err(e) => {
                log::warn!("[graph] Cannot read {}: {}, starting empty", path.display(), e);
                KnowledgeGraph::new()
            }
        };

        Self {
            graph,
            path: Some(path),
            fuzzy_threshold: None,
        }
    }

    /// Resolve near-duplicate labels on merge when similarity exceeds `threshold`.
    pub fn with_fuzzy_threshold(mut self, threshold: Option<f64>) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Owned copy of the current graph.
    pub fn snapshot(&self) -> KnowledgeGraph {
        self.graph.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn fuzzy_threshold(&self) -> Option<f64> {
        self.fuzzy_threshold
    }

    /// Merge triples and persist if anything changed.
    pub fn merge(&mut self, triples: &[Triple], kind: NodeKind, source: Provenance) -> MergeReport {
        let report = self.graph.merge(triples, kind, source, self.fuzzy_threshold);
        if report.changed() {
            self.write_through();
        }
        report
    }

    /// Merge another graph wholesale and persist if anything changed.
    pub fn merge_graph(
        &mut self,
        other: &KnowledgeGraph,
        default_kind: NodeKind,
        source: Provenance,
    ) -> MergeReport {
        let report = self.graph.merge_graph(other, default_kind, source);
        if report.changed() {
            self.write_through();
        }
        report
    }

    /// Record a cycle's input and reflection nodes.
    pub fn record_insight(&mut self, insight: &CycleInsight) -> bool {
        let changed = self.graph.add_insight(insight);
        if changed {
            self.write_through();
        }
        changed
    }

    pub fn add_goal(&mut self, goal: &str) -> bool {
        let changed = self.graph.add_goal(goal);
        if changed {
            self.write_through();
        }
        changed
    }

    pub fn goal_transition(&mut self, previous: &str, next: &str) -> bool {
        let before = (self.graph.node_count(), self.graph.edge_count());
        let inserted = self.graph.goal_transition(previous, next);
        if inserted || before != (self.graph.node_count(), self.graph.edge_count()) {
            self.write_through();
        }
        inserted
    }

    /// Write the graph to disk: serialize to a sibling temp file, then rename.
    pub fn persist(&self) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(&self.graph)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| CoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;
        Ok(())
    }

    fn write_through(&self) {
        if let Err(e) = self.persist() {
            log::error!("[graph] Failed to persist graph: {}", e);
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = GraphStore::open(dir.path().join("graph.json"));
        assert!(store.graph().is_empty());
    }

    #[test]
    fn test_changes_are_written_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("graph.json");

        let mut store = GraphStore::open(&path);
        store.merge(&[Triple::new("Music", "causes", "Joy")], NodeKind::Concept, Provenance::Llm);
        store.goal_transition("Explore music", "Explore joy");
        assert!(path.exists());

        let reopened = GraphStore::open(&path);
        assert_eq!(reopened.graph(), store.graph());
        assert!(reopened.graph().has_edge("Music", "causes", "Joy"));
        assert_eq!(reopened.graph().goal_path(), vec!["Explore music", "Explore joy"]);
    }

    #[test]
    fn test_corrupt_file_resets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = GraphStore::open(&path);
        assert!(store.graph().is_empty());

        store.add_goal("Understand rhythm");
        let reopened = GraphStore::open(&path);
        assert!(reopened.graph().contains("Understand rhythm"));
    }

    #[test]
    fn test_failed_write_keeps_graph_in_memory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a regular file").unwrap();

        let mut store = GraphStore::open(blocker.join("graph.json"));
        let report = store.merge(&[Triple::new("Music", "causes", "Joy")], NodeKind::Concept, Provenance::Llm);

        assert_eq!(report.inserted_edges, 1);
        assert!(store.graph().has_edge("Music", "causes", "Joy"));
        assert!(matches!(store.persist(), Err(CoreError::Io { .. })));
        assert!(blocker.is_file());
    }

    #[test]
    fn test_merge_graph_and_insight_are_written_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        let mut other = KnowledgeGraph::new();
        other.merge(&[Triple::new("Rhythm", "shapes", "Dance")], NodeKind::Concept, Provenance::Llm, None);

        let mut store = GraphStore::open(&path);
        store.merge_graph(&other, NodeKind::Concept, Provenance::System);
        store.record_insight(&CycleInsight {
            cycle: "c1".to_string(),
            input: "Explore rhythm".to_string(),
            goal: "Explore rhythm".to_string(),
            reflection: "Rhythm shapes dance.".to_string(),
            reading: metabo_rules::interpret(0.0, 0.0),
            source: Provenance::User,
        });

        let reopened = GraphStore::open(&path);
        assert!(reopened.graph().has_edge("Rhythm", "shapes", "Dance"));
        assert!(reopened.graph().contains("input:Explore rhythm"));
        assert!(reopened.graph().contains("reflection:c1"));
    }

    #[test]
    fn test_in_memory_store_persist_is_noop() {
        let mut store = GraphStore::in_memory().with_fuzzy_threshold(Some(0.85));
        store.merge(&[Triple::new("A", "r", "B")], NodeKind::Concept, Provenance::User);
        assert!(store.persist().is_ok());
        assert!(store.path().is_none());
        assert_eq!(store.snapshot().edge_count(), 1);
    }
}
