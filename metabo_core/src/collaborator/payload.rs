//! Structured collaborator payloads and their validation.

use metabo_rules::{EmotionReading, Intensity, Mode, ModeDecision, Polarity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Outcome;
use crate::parsing::parse_json_safe;

/// A collaborator's opinion on the active goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalSuggestion {
    /// Stay with the current goal.
    Keep,
    /// Move to a new goal; still subject to confirmation.
    Shift(String),
}

impl GoalSuggestion {
    /// The proposed goal, if this suggests a shift.
    pub fn candidate(&self) -> Option<&str> {
        match self {
            GoalSuggestion::Keep => None,
            GoalSuggestion::Shift(goal) => Some(goal),
        }
    }

    /// Validate a JSON payload.
    ///
    /// Accepts `{"change_goal": bool, "new_goal": "..."}` and `{"goal": "..."}`.
    pub fn from_json(value: &Value) -> Outcome<Self> {
        let Some(map) = value.as_object() else {
            return Outcome::Malformed(format!("expected an object, got {}", value));
        };

        if let Some(change) = map.get("change_goal") {
            let Some(change) = change.as_bool() else {
                return Outcome::Malformed("change_goal is not a boolean".to_string());
            };
            if !change {
                return Outcome::Ok(GoalSuggestion::Keep);
            }
            return match map.get("new_goal").and_then(Value::as_str).map(str::trim) {
                Some(goal) if !goal.is_empty() => Outcome::Ok(GoalSuggestion::Shift(goal.to_string())),
                _ => Outcome::Malformed("change_goal without new_goal".to_string()),
            };
        }

        match map.get("goal") {
            Some(Value::String(goal)) if goal.trim().is_empty() => Outcome::Ok(GoalSuggestion::Keep),
            Some(Value::String(goal)) => Outcome::Ok(GoalSuggestion::Shift(goal.trim().to_string())),
            Some(Value::Null) => Outcome::Ok(GoalSuggestion::Keep),
            _ => Outcome::Malformed("missing goal field".to_string()),
        }
    }

    /// Validate a raw text response holding a JSON payload.
    pub fn parse(text: &str) -> Outcome<Self> {
        match parse_json_safe(text) {
            Some(value) => Self::from_json(&value),
            None => Outcome::Malformed("no JSON in goal response".to_string()),
        }
    }
}

/// A collaborator's vote on the next mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeVerdict {
    pub mode: Mode,
    #[serde(default)]
    pub rationale: String,
}

impl ModeVerdict {
    /// Validate `{"mode": "reflective" | "directed", "rationale": "..."}`.
    ///
    /// `yin` and `yang` are accepted as mode names.
    pub fn from_json(value: &Value) -> Outcome<Self> {
        let Some(mode) = value.get("mode").and_then(Value::as_str) else {
            return Outcome::Malformed("missing mode field".to_string());
        };
        let mode = match mode.parse::<Mode>() {
            Ok(mode) => mode,
            Err(e) => return Outcome::Malformed(e.to_string()),
        };
        let rationale = value
            .get("rationale")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        Outcome::Ok(ModeVerdict { mode, rationale })
    }

    pub fn parse(text: &str) -> Outcome<Self> {
        match parse_json_safe(text) {
            Some(value) => Self::from_json(&value),
            None => Outcome::Malformed("no JSON in mode response".to_string()),
        }
    }
}

/// Cycle measurements handed to the collaborator for its mode vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeMetrics {
    pub entropy_before: f64,
    pub entropy_after: f64,
    pub entropy_delta: f64,
    pub emotion: Polarity,
    pub intensity: Intensity,
    /// The mode the local controller chose.
    pub proposed_mode: Mode,
    /// Number of reflective votes the local controller counted.
    pub votes: usize,
    pub completed_subgoals: usize,
}

impl ModeMetrics {
    pub fn new(
        entropy_before: f64,
        entropy_after: f64,
        reading: &EmotionReading,
        decision: &ModeDecision,
        completed_subgoals: usize,
    ) -> Self {
        Self {
            entropy_before,
            entropy_after,
            entropy_delta: reading.delta,
            emotion: reading.polarity,
            intensity: reading.intensity,
            proposed_mode: decision.mode,
            votes: decision.votes.len(),
            completed_subgoals,
        }
    }

    /// Compact JSON for prompts.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
