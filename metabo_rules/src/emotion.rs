//! Emotion interpretation - turns an entropy change into qualitative feedback.
//!
//! Falling disorder is rewarding, rising disorder is aversive.

use serde::{Deserialize, Serialize};

/// |delta| at which polarity leaves neutral and intensity leaves low.
pub const POLARITY_THRESHOLD: f64 = 0.05;

/// |delta| above which intensity is high.
pub const HIGH_INTENSITY_THRESHOLD: f64 = 0.15;

/// Direction of the emotional response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Neutral,
    Negative,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Neutral => "neutral",
            Polarity::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength of the emotional response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
        }
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of interpreting an entropy change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    /// `after - before`.
    pub delta: f64,
    pub polarity: Polarity,
    pub intensity: Intensity,
}

/// Interpret the change from `before` to `after`.
pub fn interpret(before: f64, after: f64) -> EmotionReading {
    interpret_delta(after - before)
}

/// Interpret an already computed entropy delta.
pub fn interpret_delta(delta: f64) -> EmotionReading {
    let polarity = if delta <= -POLARITY_THRESHOLD {
        Polarity::Positive
    } else if delta >= POLARITY_THRESHOLD {
        Polarity::Negative
    } else {
        Polarity::Neutral
    };

    let magnitude = delta.abs();
    let intensity = if magnitude < POLARITY_THRESHOLD {
        Intensity::Low
    } else if magnitude <= HIGH_INTENSITY_THRESHOLD {
        Intensity::Medium
    } else {
        Intensity::High
    };

    EmotionReading {
        delta,
        polarity,
        intensity,
    }
}
