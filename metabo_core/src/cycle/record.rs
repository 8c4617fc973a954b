//! Cycle records - the immutable per-turn log entries.

use chrono::{DateTime, Utc};
use metabo_rules::{EmotionReading, Intensity, Mode, Polarity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge_base::{Provenance, Triple};

/// Unique identifier for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(pub Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a cycle's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    #[default]
    User,
    System,
}

impl InputSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputSource::User => "user",
            InputSource::System => "system",
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InputSource> for Provenance {
    fn from(source: InputSource) -> Self {
        match source {
            InputSource::User => Provenance::User,
            InputSource::System => Provenance::System,
        }
    }
}

/// Write-once record of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub id: CycleId,
    pub input: String,
    pub source: InputSource,
    /// The mode this cycle ran in.
    pub mode: Mode,
    pub reflection: String,
    /// Facts merged into the graph this cycle.
    pub triples: Vec<Triple>,
    pub entropy_before: f64,
    pub entropy_after: f64,
    pub delta: f64,
    pub emotion: Polarity,
    pub intensity: Intensity,
    pub timestamp: DateTime<Utc>,
}

impl CycleRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input: &str,
        source: InputSource,
        mode: Mode,
        reflection: &str,
        triples: Vec<Triple>,
        entropy_before: f64,
        entropy_after: f64,
        reading: &EmotionReading,
    ) -> Self {
        Self {
            id: CycleId::new(),
            input: input.to_string(),
            source,
            mode,
            reflection: reflection.to_string(),
            triples,
            entropy_before,
            entropy_after,
            delta: reading.delta,
            emotion: reading.polarity,
            intensity: reading.intensity,
            timestamp: Utc::now(),
        }
    }
}
