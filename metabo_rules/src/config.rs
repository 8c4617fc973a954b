//! Tunable rule thresholds, loaded from TOML.

use serde::{Deserialize, Serialize};

use crate::{ModeConfig, RulesError};

/// Thresholds for detecting and confirming goal shifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalShiftConfig {
    /// Leading characters of the input compared against the current goal.
    pub topic_prefix_len: usize,
    /// Embedding cosine similarity below which a candidate is a new goal.
    pub embedding_threshold: f64,
    /// Edit similarity below which a candidate is a new goal.
    pub edit_threshold: f64,
}

impl Default for GoalShiftConfig {
    fn default() -> Self {
        Self {
            topic_prefix_len: 25,
            embedding_threshold: 0.8,
            edit_threshold: 0.6,
        }
    }
}

/// All rule thresholds. Every field has a default, so partial files work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub mode: ModeConfig,
    pub goals: GoalShiftConfig,
}

impl RulesConfig {
    /// Parse a TOML document with optional `[mode]` and `[goals]` tables.
    pub fn from_toml_str(source: &str) -> Result<Self, RulesError> {
        Ok(toml::from_str(source)?)
    }
}
