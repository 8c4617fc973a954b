//! Concept node definitions - the vertices of the knowledge graph.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Normalize a label into its unique key: trimmed, inner whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Type tag of a node. A node may carry several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Concept,
    Goal,
    Input,
    Reflection,
    Intention,
    Custom(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Concept => "concept",
            NodeKind::Goal => "goal",
            NodeKind::Input => "input",
            NodeKind::Reflection => "reflection",
            NodeKind::Intention => "intention",
            NodeKind::Custom(s) => s,
        }
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "concept" => NodeKind::Concept,
            "goal" => NodeKind::Goal,
            "input" => NodeKind::Input,
            "reflection" => NodeKind::Reflection,
            "intention" => NodeKind::Intention,
            _ => NodeKind::Custom(value),
        }
    }
}

impl From<NodeKind> for String {
    fn from(value: NodeKind) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a node or edge came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provenance {
    User,
    System,
    Llm,
    Custom(String),
}

impl Provenance {
    pub fn as_str(&self) -> &str {
        match self {
            Provenance::User => "user",
            Provenance::System => "system",
            Provenance::Llm => "llm",
            Provenance::Custom(s) => s,
        }
    }
}

impl From<String> for Provenance {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Provenance::User,
            "system" => Provenance::System,
            "llm" => Provenance::Llm,
            _ => Provenance::Custom(value),
        }
    }
}

impl From<Provenance> for String {
    fn from(value: Provenance) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concept in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    /// Normalized label, unique within a graph.
    pub label: String,

    #[serde(default)]
    pub kinds: BTreeSet<NodeKind>,

    #[serde(default)]
    pub sources: BTreeSet<Provenance>,

    /// Free text attached to the node.
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ConceptNode {
    /// Create an untagged node; the label is normalized.
    pub fn new(label: &str) -> Self {
        Self {
            label: normalize_label(label),
            kinds: BTreeSet::new(),
            sources: BTreeSet::new(),
            text: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn with_source(mut self, source: Provenance) -> Self {
        self.sources.insert(source);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn has_kind(&self, kind: &NodeKind) -> bool {
        self.kinds.contains(kind)
    }

    /// Union another node's tags into this one.
    ///
    /// Text and metadata only fill gaps; existing values win. Returns true if
    /// anything changed.
    pub fn absorb(&mut self, other: ConceptNode) -> bool {
        let before = (self.kinds.len(), self.sources.len(), self.metadata.len());
        self.kinds.extend(other.kinds);
        self.sources.extend(other.sources);
        for (key, value) in other.metadata {
            self.metadata.entry(key).or_insert(value);
        }
        let mut changed = before != (self.kinds.len(), self.sources.len(), self.metadata.len());
        if self.text.is_empty() && !other.text.is_empty() {
            self.text = other.text;
            changed = true;
        }
        changed
    }
}
