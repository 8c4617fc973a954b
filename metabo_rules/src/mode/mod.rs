//! Mode control - the hysteretic reflective/directed state machine.
//!
//! Each decision is a vote over several indicators. Every indicator that
//! fires adds one reflective vote:
//!
//! 1. explicit reflect/introspect cue in the input
//! 2. negative input sentiment
//! 3. a negative or uncertain emotion label
//! 4. rising entropy trend over the recent window
//! 5. a negative or stalled entropy delta
//! 6. few completed subgoals
//! 7. the last few decisions were identical
//!
//! An explicit act/execute cue short-circuits to [`Mode::Directed`]. A
//! heartbeat inverts the computed mode at a fixed interval, and a manual
//! override pins the mode until cleared.

mod indicators;

pub use indicators::*;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;

use crate::RulesError;

/// Operating mode of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Introspection: no new facts, reuse the stored reflection.
    #[serde(alias = "yin")]
    Reflective,
    /// Goal pursuit: generate a reflection and ingest facts.
    #[default]
    #[serde(alias = "yang")]
    Directed,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Reflective => "reflective",
            Mode::Directed => "directed",
        }
    }

    /// The opposite mode.
    pub fn inverted(&self) -> Mode {
        match self {
            Mode::Reflective => Mode::Directed,
            Mode::Directed => Mode::Reflective,
        }
    }

    /// Short instruction describing how a collaborator should behave in this mode.
    pub fn hint(&self) -> &'static str {
        match self {
            Mode::Reflective => {
                "Reflective mode: step back, clarify uncertainty, check memory and context \
                 before adding anything new."
            }
            Mode::Directed => {
                "Directed mode: pursue the active goal, propose concrete next steps and \
                 integrate new facts."
            }
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reflective" | "yin" => Ok(Mode::Reflective),
            "directed" | "yang" => Ok(Mode::Directed),
            other => Err(RulesError::UnknownMode(other.to_string())),
        }
    }
}

/// Tunable parameters of the mode controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Decisions between forced inversions; `None` or 0 disables the heartbeat.
    pub heartbeat_interval: Option<u32>,
    /// Reflective iff votes exceed this.
    pub vote_threshold: usize,
    /// Length of the rolling delta window.
    pub delta_window: usize,
    /// Length of the rolling decision history.
    pub history_len: usize,
    /// Rolling mean delta above which the trend indicator fires.
    pub trend_threshold: f64,
    /// |delta| below which the cycle counts as stalled.
    pub stall_threshold: f64,
    /// Sentiment polarity below which the input counts as negative.
    pub sentiment_threshold: f64,
    /// Completed subgoal count below which the progress indicator fires.
    pub min_completed_subgoals: usize,
    /// Number of identical trailing decisions that count as monotony.
    pub monotony_run: usize,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: None,
            vote_threshold: 2,
            delta_window: 5,
            history_len: 5,
            trend_threshold: 0.1,
            stall_threshold: 0.01,
            sentiment_threshold: -0.1,
            min_completed_subgoals: 2,
            monotony_run: 3,
        }
    }
}

/// Metrics and text feeding one decision.
#[derive(Debug, Clone, Default)]
pub struct ModeInputs<'a> {
    pub text: &'a str,
    pub entropy_delta: f64,
    pub emotion: Option<&'a str>,
    pub completed_subgoals: usize,
    /// Externally measured sentiment; the local lexicon is used when absent.
    pub sentiment: Option<f64>,
}

impl<'a> ModeInputs<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            ..Default::default()
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.entropy_delta = delta;
        self
    }

    pub fn with_emotion(mut self, emotion: &'a str) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_completed_subgoals(mut self, count: usize) -> Self {
        self.completed_subgoals = count;
        self
    }

    pub fn with_sentiment(mut self, polarity: f64) -> Self {
        self.sentiment = Some(polarity);
        self
    }
}

/// Indicators that can cast a reflective vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    ReflectCue,
    NegativeSentiment,
    UncertainEmotion,
    RisingTrend,
    StalledDelta,
    FewSubgoals,
    Monotony,
}

/// What determined the final mode of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTrigger {
    Vote,
    ActCue,
    Heartbeat,
    Override,
}

/// Outcome of one decision, kept for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDecision {
    pub mode: Mode,
    pub trigger: DecisionTrigger,
    /// Indicators that voted reflective.
    pub votes: Vec<Indicator>,
    /// Indicators that had enough data to be evaluated.
    pub active_indicators: usize,
    /// Rolling mean of the delta window, including this decision.
    pub trend: f64,
}

#[derive(Debug, Clone)]
struct Heartbeat {
    interval: u32,
    elapsed: u32,
}

impl Heartbeat {
    /// Count one decision; true when the interval has elapsed.
    fn beat(&mut self) -> bool {
        self.elapsed += 1;
        if self.elapsed >= self.interval {
            self.elapsed = 0;
            true
        } else {
            false
        }
    }
}

/// Owns the current mode together with its rolling history and delta window.
#[derive(Debug, Clone)]
pub struct ModeController {
    config: ModeConfig,
    current: Mode,
    pinned: Option<Mode>,
    history: VecDeque<Mode>,
    deltas: VecDeque<f64>,
    heartbeat: Option<Heartbeat>,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new(ModeConfig::default())
    }
}

impl ModeController {
    /// Create a controller in [`Mode::Directed`].
    pub fn new(config: ModeConfig) -> Self {
        let heartbeat = config
            .heartbeat_interval
            .filter(|interval| *interval > 0)
            .map(|interval| Heartbeat {
                interval,
                elapsed: 0,
            });
        Self {
            config,
            current: Mode::default(),
            pinned: None,
            history: VecDeque::new(),
            deltas: VecDeque::new(),
            heartbeat,
        }
    }

    pub fn config(&self) -> &ModeConfig {
        &self.config
    }

    /// The mode the next cycle runs in.
    pub fn current(&self) -> Mode {
        self.current
    }

    /// Recent decisions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = Mode> + '_ {
        self.history.iter().copied()
    }

    /// Recent entropy deltas, oldest first.
    pub fn deltas(&self) -> impl Iterator<Item = f64> + '_ {
        self.deltas.iter().copied()
    }

    pub fn override_mode(&self) -> Option<Mode> {
        self.pinned
    }

    /// Pin the mode; votes and heartbeat are bypassed until cleared.
    pub fn set_override(&mut self, mode: Mode) {
        log::info!("[mode] Mode manually pinned to {}", mode);
        self.pinned = Some(mode);
        self.current = mode;
    }

    pub fn clear_override(&mut self) {
        if self.pinned.take().is_some() {
            log::info!("[mode] Manual override cleared");
        }
    }

    /// Replace the most recent decision with an externally chosen mode.
    ///
    /// Ignored while an override is pinned.
    pub fn adopt(&mut self, mode: Mode) {
        if self.pinned.is_some() {
            return;
        }
        if let Some(last) = self.history.back_mut() {
            *last = mode;
        } else {
            self.push_history(mode);
        }
        self.current = mode;
    }

    /// Decide the mode for the next cycle.
    pub fn decide(&mut self, inputs: &ModeInputs<'_>) -> ModeDecision {
        self.deltas.push_back(inputs.entropy_delta);
        while self.deltas.len() > self.config.delta_window.max(1) {
            self.deltas.pop_front();
        }
        let trend = self.deltas.iter().sum::<f64>() / self.deltas.len() as f64;

        if let Some(mode) = self.pinned {
            self.push_history(mode);
            self.current = mode;
            return ModeDecision {
                mode,
                trigger: DecisionTrigger::Override,
                votes: Vec::new(),
                active_indicators: 0,
                trend,
            };
        }

        let (votes, active_indicators) = self.collect_votes(inputs, trend);
        let cues = scan_cues(inputs.text);

        let (mut mode, mut trigger) = if cues.act {
            (Mode::Directed, DecisionTrigger::ActCue)
        } else if votes.len() > self.config.vote_threshold {
            (Mode::Reflective, DecisionTrigger::Vote)
        } else {
            (Mode::Directed, DecisionTrigger::Vote)
        };

        if self.heartbeat.as_mut().is_some_and(Heartbeat::beat) {
            mode = mode.inverted();
            trigger = DecisionTrigger::Heartbeat;
            log::info!("[mode] Heartbeat toggled mode to {}", mode);
        }

        log::debug!(
            "[mode] Decision: {} via {:?} (votes {}/{}, delta {:.3}, trend {:.3})",
            mode,
            trigger,
            votes.len(),
            active_indicators,
            inputs.entropy_delta,
            trend
        );

        self.push_history(mode);
        self.current = mode;

        ModeDecision {
            mode,
            trigger,
            votes,
            active_indicators,
            trend,
        }
    }

    fn collect_votes(&self, inputs: &ModeInputs<'_>, trend: f64) -> (Vec<Indicator>, usize) {
        let config = &self.config;
        let mut votes = Vec::new();
        let mut active = 0usize;

        let mut cast = |indicator: Indicator, fires: bool| {
            active += 1;
            if fires {
                votes.push(indicator);
            }
        };

        cast(Indicator::ReflectCue, scan_cues(inputs.text).reflect);

        let polarity = inputs.sentiment.unwrap_or_else(|| sentiment(inputs.text));
        cast(Indicator::NegativeSentiment, polarity < config.sentiment_threshold);

        if let Some(emotion) = inputs.emotion {
            let label = emotion.trim().to_lowercase();
            cast(
                Indicator::UncertainEmotion,
                matches!(label.as_str(), "negative" | "uncertain" | "unsicher"),
            );
        }

        cast(Indicator::RisingTrend, trend > config.trend_threshold);

        let delta = inputs.entropy_delta;
        cast(
            Indicator::StalledDelta,
            delta < 0.0 || delta.abs() < config.stall_threshold,
        );

        cast(
            Indicator::FewSubgoals,
            inputs.completed_subgoals < config.min_completed_subgoals,
        );

        let run = config.monotony_run.max(1);
        if self.history.len() >= run {
            let mut recent = self.history.iter().rev().take(run);
            let first = recent.next().copied();
            cast(Indicator::Monotony, recent.all(|m| Some(*m) == first));
        }

        (votes, active)
    }

    fn push_history(&mut self, mode: Mode) {
        self.history.push_back(mode);
        while self.history.len() > self.config.history_len.max(1) {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calm<'a>(text: &'a str, delta: f64) -> ModeInputs<'a> {
        ModeInputs::new(text)
            .with_delta(delta)
            .with_emotion("positive")
            .with_completed_subgoals(3)
    }

    #[test]
    fn test_initial_mode_is_directed() {
        assert_eq!(ModeController::default().current(), Mode::Directed);
    }

    #[test]
    fn test_directed_leaning_inputs_stay_directed() {
        let mut controller = ModeController::default();
        let decision = controller.decide(&calm("Music links to memory", 0.05));
        assert_eq!(decision.mode, Mode::Directed);
        assert!(decision.votes.is_empty());
        assert_eq!(decision.trigger, DecisionTrigger::Vote);
    }

    #[test]
    fn test_negative_signals_flip_to_reflective() {
        let mut controller = ModeController::default();
        assert_eq!(
            controller.decide(&calm("Music links to memory", 0.05)).mode,
            Mode::Directed
        );

        let inputs = ModeInputs::new("I feel sad and confused about this")
            .with_delta(0.3)
            .with_emotion("negative")
            .with_completed_subgoals(3);
        let decision = controller.decide(&inputs);

        assert!(decision.trend > 0.1);
        assert_eq!(decision.votes.len(), 3);
        assert!(decision.votes.contains(&Indicator::NegativeSentiment));
        assert!(decision.votes.contains(&Indicator::UncertainEmotion));
        assert!(decision.votes.contains(&Indicator::RisingTrend));
        assert_eq!(decision.mode, Mode::Reflective);
        assert_eq!(controller.current(), Mode::Reflective);
    }

    #[test]
    fn test_act_cue_overrides_votes() {
        let mut controller = ModeController::default();
        let inputs = ModeInputs::new("sad and confused, but execute anyway")
            .with_delta(-0.2)
            .with_emotion("negative");
        let decision = controller.decide(&inputs);
        assert!(decision.votes.len() > 2);
        assert_eq!(decision.mode, Mode::Directed);
        assert_eq!(decision.trigger, DecisionTrigger::ActCue);
    }

    #[test]
    fn test_heartbeat_inverts_after_interval() {
        let config = ModeConfig {
            heartbeat_interval: Some(3),
            ..ModeConfig::default()
        };
        let mut controller = ModeController::new(config);
        let before = controller.current();

        let modes: Vec<_> = (0..3)
            .map(|_| controller.decide(&ModeInputs::new("act now")).mode)
            .collect();

        assert_eq!(modes[0], Mode::Directed);
        assert_eq!(modes[1], Mode::Directed);
        assert_eq!(modes[2], Mode::Reflective);
        assert_ne!(before, controller.current());

        // re-armed: the next decision follows the cue again
        assert_eq!(controller.decide(&ModeInputs::new("act now")).mode, Mode::Directed);
    }

    #[test]
    fn test_override_pins_mode() {
        let config = ModeConfig {
            heartbeat_interval: Some(1),
            ..ModeConfig::default()
        };
        let mut controller = ModeController::new(config);
        controller.set_override(Mode::Reflective);

        for _ in 0..4 {
            let decision = controller.decide(&ModeInputs::new("execute the plan"));
            assert_eq!(decision.mode, Mode::Reflective);
            assert_eq!(decision.trigger, DecisionTrigger::Override);
        }

        controller.clear_override();
        let decision = controller.decide(&ModeInputs::new("execute the plan"));
        assert_eq!(decision.trigger, DecisionTrigger::Heartbeat);
    }

    #[test]
    fn test_every_decision_updates_window_and_history() {
        let mut controller = ModeController::default();
        controller.set_override(Mode::Directed);
        for i in 0..7 {
            controller.decide(&ModeInputs::new("x").with_delta(i as f64));
        }
        assert_eq!(controller.history().count(), 5);
        assert_eq!(controller.deltas().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_monotony_votes_after_identical_run() {
        let mut controller = ModeController::default();
        for _ in 0..3 {
            controller.decide(&calm("steady progress", 0.05));
        }
        let decision = controller.decide(&calm("steady progress", 0.05));
        assert!(decision.votes.contains(&Indicator::Monotony));
        assert_eq!(decision.active_indicators, 7);
        assert_eq!(decision.mode, Mode::Directed);
    }

    #[test]
    fn test_adopt_replaces_last_decision() {
        let mut controller = ModeController::default();
        controller.decide(&calm("steady", 0.05));
        controller.adopt(Mode::Reflective);
        assert_eq!(controller.current(), Mode::Reflective);
        assert_eq!(controller.history().collect::<Vec<_>>(), vec![Mode::Reflective]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Reflective".parse::<Mode>().ok(), Some(Mode::Reflective));
        assert_eq!("yang".parse::<Mode>().ok(), Some(Mode::Directed));
        assert!("sideways".parse::<Mode>().is_err());
        assert_eq!(Mode::Directed.inverted(), Mode::Reflective);
    }
}
