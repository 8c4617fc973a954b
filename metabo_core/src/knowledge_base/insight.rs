//! Cycle insights - each cycle's input and reflection recorded as graph nodes.
//!
//! An insight adds:
//! - an **input node** (`input:<text>`) linked to the goal it was read under
//! - a **reflection node** (`reflection:<cycle>`) linked to that input, with
//!   the cycle's emotion in its metadata
//!
//! Input nodes are shared by identical inputs; every cycle gets its own
//! reflection node.

use chrono::Utc;
use metabo_rules::EmotionReading;
use serde_json::Value;

use super::{
    normalize_label, ConceptNode, EdgeKind, KnowledgeGraph, NodeKind, Provenance, RelationEdge,
    Triple, REFLECTS_ON, SERVES_GOAL,
};

/// Label prefix of input nodes.
pub const INPUT_PREFIX: &str = "input:";

/// Label prefix of reflection nodes.
pub const REFLECTION_PREFIX: &str = "reflection:";

/// What one cycle saw and felt.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleInsight {
    /// Cycle identifier, used to key the reflection node.
    pub cycle: String,
    pub input: String,
    /// Goal the cycle worked on; empty when there was none.
    pub goal: String,
    /// Reflection text; empty when the cycle produced none.
    pub reflection: String,
    pub reading: EmotionReading,
    pub source: Provenance,
}

impl CycleInsight {
    pub fn input_label(&self) -> String {
        format!("{}{}", INPUT_PREFIX, normalize_label(&self.input))
    }

    pub fn reflection_label(&self) -> String {
        format!("{}{}", REFLECTION_PREFIX, normalize_label(&self.cycle))
    }
}

impl KnowledgeGraph {
    /// Record `insight` in the graph. A blank input records nothing.
    ///
    /// Returns true if the graph changed.
    pub fn add_insight(&mut self, insight: &CycleInsight) -> bool {
        let input = normalize_label(&insight.input);
        if input.is_empty() {
            return false;
        }
        let now = Utc::now();
        let input_label = insight.input_label();

        let mut changed = self.upsert_node(
            ConceptNode::new(&input_label)
                .with_kind(NodeKind::Input)
                .with_source(insight.source.clone())
                .with_text(input),
        );

        let goal = normalize_label(&insight.goal);
        if !goal.is_empty() {
            changed |= self.add_goal(&goal);
            changed |= self.insert_edge(
                RelationEdge::from_triple(
                    Triple::new(input_label.clone(), SERVES_GOAL, goal),
                    Provenance::System,
                )
                .with_kind(EdgeKind::Insight)
                .with_timestamp(now),
            );
        }

        let reflection = insight.reflection.trim();
        if !reflection.is_empty() {
            let reflection_label = insight.reflection_label();
            changed |= self.upsert_node(
                ConceptNode::new(&reflection_label)
                    .with_kind(NodeKind::Reflection)
                    .with_source(Provenance::System)
                    .with_text(reflection)
                    .with_metadata("emotion", Value::from(insight.reading.polarity.as_str()))
                    .with_metadata("intensity", Value::from(insight.reading.intensity.as_str()))
                    .with_metadata("delta", Value::from(insight.reading.delta)),
            );
            changed |= self.insert_edge(
                RelationEdge::from_triple(
                    Triple::new(reflection_label, REFLECTS_ON, input_label),
                    Provenance::System,
                )
                .with_kind(EdgeKind::Insight)
                .with_timestamp(now),
            );
        }

        if changed {
            log::debug!("[graph] Recorded insight for cycle {}", insight.cycle);
        }
        changed
    }
}
