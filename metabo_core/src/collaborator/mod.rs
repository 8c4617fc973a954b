//! Collaborator boundary - everything the engine asks of an outside model.
//!
//! The engine never talks to a network itself. A [`Collaborator`] answers
//! prompts, extracts facts, proposes goals, votes on the next mode, and embeds
//! text. Every answer is an [`Outcome`] so the engine can tell "no answer" from
//! "an answer that made no sense" and apply the right fallback.

mod payload;

pub use payload::*;

use crate::knowledge_base::Triple;

/// Result of one collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// A validated answer.
    Ok(T),
    /// The collaborator answered but the answer failed validation.
    Malformed(String),
    /// The collaborator could not be reached or does not offer this call.
    Unavailable,
}

impl<T> Outcome<T> {
    /// The validated value, if any.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Malformed(_) | Outcome::Unavailable => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Malformed(reason) => Outcome::Malformed(reason),
            Outcome::Unavailable => Outcome::Unavailable,
        }
    }

    /// The validated value, logging why there is none.
    ///
    /// `Malformed` is logged at warn level, `Unavailable` at debug.
    pub fn or_log(self, call: &str) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Malformed(reason) => {
                log::warn!("[collaborator] Malformed {} response: {}", call, reason);
                None
            }
            Outcome::Unavailable => {
                log::debug!("[collaborator] {} unavailable", call);
                None
            }
        }
    }
}

/// Core trait for the outside model the engine consults.
///
/// Every method defaults to [`Outcome::Unavailable`], so an implementation
/// only provides what it supports and the engine falls back for the rest.
pub trait Collaborator {
    /// Generate free text for a system prompt and a user-side context.
    fn generate(&self, system_prompt: &str, context: &str) -> Outcome<String> {
        let _ = (system_prompt, context);
        Outcome::Unavailable
    }

    /// Extract (subject, relation, object) facts from text.
    fn extract_facts(&self, text: &str) -> Outcome<Vec<Triple>> {
        let _ = text;
        Outcome::Unavailable
    }

    /// Propose a goal for `text`, given the current goal.
    fn propose_goal(&self, text: &str, current: &str) -> Outcome<GoalSuggestion> {
        let _ = (text, current);
        Outcome::Unavailable
    }

    /// Vote on the next mode.
    fn decide_mode(&self, text: &str, metrics: &ModeMetrics) -> Outcome<ModeVerdict> {
        let _ = (text, metrics);
        Outcome::Unavailable
    }

    /// Embed text as a dense vector.
    fn embed(&self, text: &str) -> Outcome<Vec<f32>> {
        let _ = text;
        Outcome::Unavailable
    }
}

/// A collaborator that offers nothing; the engine runs on local fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl Collaborator for Offline {}

impl<C: Collaborator + ?Sized> Collaborator for &C {
    fn generate(&self, system_prompt: &str, context: &str) -> Outcome<String> {
        (**self).generate(system_prompt, context)
    }

    fn extract_facts(&self, text: &str) -> Outcome<Vec<Triple>> {
        (**self).extract_facts(text)
    }

    fn propose_goal(&self, text: &str, current: &str) -> Outcome<GoalSuggestion> {
        (**self).propose_goal(text, current)
    }

    fn decide_mode(&self, text: &str, metrics: &ModeMetrics) -> Outcome<ModeVerdict> {
        (**self).decide_mode(text, metrics)
    }

    fn embed(&self, text: &str) -> Outcome<Vec<f32>> {
        (**self).embed(text)
    }
}
