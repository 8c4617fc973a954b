//! Relation definitions - triples and the directed edges that store them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_label, Provenance};

/// Relation label used for goal transition edges.
pub const GOAL_TRANSITION: &str = "goal_transition";

/// Relation label linking an input node to the goal it was read under.
pub const SERVES_GOAL: &str = "serves_goal";

/// Relation label linking a reflection node to the input it answered.
pub const REFLECTS_ON: &str = "reflects_on";

/// A (subject, relation, object) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }

    /// Normalized copy, or `None` if any component is blank.
    pub fn normalized(&self) -> Option<Triple> {
        let subject = normalize_label(&self.subject);
        let relation = normalize_label(&self.relation);
        let object = normalize_label(&self.object);
        if subject.is_empty() || relation.is_empty() || object.is_empty() {
            return None;
        }
        Some(Triple {
            subject,
            relation,
            object,
        })
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.relation, self.object)
    }
}

/// Type of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    Relation,
    GoalTransition,
    /// Bookkeeping edge between a cycle's input, reflection, and goal.
    Insight,
    Custom(String),
}

impl EdgeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::Relation => "relation",
            EdgeKind::GoalTransition => GOAL_TRANSITION,
            EdgeKind::Insight => "insight",
            EdgeKind::Custom(s) => s,
        }
    }
}

impl From<String> for EdgeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "relation" => EdgeKind::Relation,
            GOAL_TRANSITION => EdgeKind::GoalTransition,
            "insight" => EdgeKind::Insight,
            _ => EdgeKind::Custom(value),
        }
    }
}

impl From<EdgeKind> for String {
    fn from(value: EdgeKind) -> Self {
        value.as_str().to_string()
    }
}

/// A directed, labeled edge. Identity is the (subject, relation, object) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub subject: String,
    pub relation: String,
    pub object: String,
    pub kind: EdgeKind,
    pub source: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RelationEdge {
    /// Create a plain relation edge from a triple.
    pub fn from_triple(triple: Triple, source: Provenance) -> Self {
        Self {
            subject: triple.subject,
            relation: triple.relation,
            object: triple.object,
            kind: EdgeKind::Relation,
            source,
            timestamp: None,
        }
    }

    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn triple(&self) -> Triple {
        Triple::new(&self.subject, &self.relation, &self.object)
    }

    /// Check if this edge touches `label` at either end.
    pub fn touches(&self, label: &str) -> bool {
        self.subject == label || self.object == label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_triples_are_rejected() {
        assert!(Triple::new("Music", " ", "Joy").normalized().is_none());
        assert!(Triple::new("", "causes", "Joy").normalized().is_none());
    }

    #[test]
    fn test_normalized_triple() {
        let triple = Triple::new(" Music ", "causes  deep", "Joy").normalized().unwrap();
        assert_eq!(triple, Triple::new("Music", "causes deep", "Joy"));
        assert_eq!(triple.to_string(), "(Music, causes deep, Joy)");
    }

    #[test]
    fn test_edge_kind_strings() {
        assert_eq!(EdgeKind::from(GOAL_TRANSITION.to_string()), EdgeKind::GoalTransition);
        assert_eq!(String::from(EdgeKind::Relation), "relation");
        assert_eq!(EdgeKind::from("insight".to_string()), EdgeKind::Insight);
    }

    #[test]
    fn test_edge_touches() {
        let edge = RelationEdge::from_triple(Triple::new("A", "r", "B"), Provenance::Llm);
        assert!(edge.touches("A"));
        assert!(edge.touches("B"));
        assert!(!edge.touches("C"));
        assert_eq!(edge.kind, EdgeKind::Relation);
    }
}
