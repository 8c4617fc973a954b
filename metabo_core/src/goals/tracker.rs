//! Goal state tracker.

use std::path::PathBuf;

use metabo_rules::{cosine_similarity, edit_similarity, GoalShiftConfig};

use crate::collaborator::Collaborator;
use crate::error::CoreResult;
use crate::knowledge_base::GraphStore;
use crate::persistence::ScalarFile;

/// Check if `input` looks unrelated to `current`: its leading characters,
/// lower-cased, do not occur in the lower-cased goal.
///
/// An empty goal makes every non-empty input a new topic.
pub fn is_new_topic(input: &str, current: &str, prefix_len: usize) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return false;
    }
    let current = current.trim();
    if current.is_empty() {
        return true;
    }
    let prefix: String = input.to_lowercase().chars().take(prefix_len).collect();
    !current.to_lowercase().contains(&prefix)
}

/// Owns the active goal and its durable copy.
#[derive(Debug, Clone, Default)]
pub struct GoalTracker {
    config: GoalShiftConfig,
    goal: ScalarFile,
}

impl GoalTracker {
    pub fn in_memory(config: GoalShiftConfig) -> Self {
        Self {
            config,
            goal: ScalarFile::in_memory(),
        }
    }

    /// Track the goal stored at `path`; a missing file means no goal.
    pub fn open(path: impl Into<PathBuf>, config: GoalShiftConfig) -> Self {
        Self {
            config,
            goal: ScalarFile::open(path),
        }
    }

    pub fn config(&self) -> &GoalShiftConfig {
        &self.config
    }

    /// The active goal, empty if none.
    pub fn active(&self) -> &str {
        self.goal.get()
    }

    /// Propose a goal for `input`.
    ///
    /// A collaborator suggestion wins, including an explicit "keep". When the
    /// collaborator has no usable answer, the trimmed input becomes the
    /// candidate if it reads as a new topic.
    pub fn propose_shift<C: Collaborator>(
        &self,
        input: &str,
        current: &str,
        collaborator: &C,
    ) -> Option<String> {
        if let Some(suggestion) = collaborator.propose_goal(input, current).or_log("propose_goal") {
            return suggestion
                .candidate()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
        }

        if is_new_topic(input, current, self.config.topic_prefix_len) {
            Some(input.trim().to_string())
        } else {
            None
        }
    }

    /// Decide whether `candidate` is different enough from `current` to shift.
    ///
    /// Uses embedding cosine similarity when the collaborator can embed both
    /// texts, otherwise normalized edit similarity.
    pub fn confirm_shift<C: Collaborator>(
        &self,
        current: &str,
        candidate: &str,
        collaborator: &C,
    ) -> bool {
        let current = current.trim();
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        if current.is_empty() {
            return true;
        }
        if current.to_lowercase() == candidate.to_lowercase() {
            return false;
        }

        let embedded = collaborator
            .embed(current)
            .or_log("embed")
            .and_then(|a| collaborator.embed(candidate).or_log("embed").map(|b| (a, b)));
        if let Some((a, b)) = embedded.filter(|(a, b)| !a.is_empty() && a.len() == b.len()) {
            let similarity = cosine_similarity(&a, &b);
            log::debug!("[goals] Embedding similarity {:.3} to current goal", similarity);
            return similarity < self.config.embedding_threshold;
        }

        let similarity = edit_similarity(current, candidate);
        log::debug!("[goals] Edit similarity {:.3} to current goal", similarity);
        similarity < self.config.edit_threshold
    }

    /// Make `next` the active goal and record the move in the graph.
    ///
    /// With no previous goal, `next` enters the graph as a lone goal node.
    /// The graph is updated even when the goal file cannot be written.
    pub fn apply_shift(&mut self, previous: &str, next: &str, store: &mut GraphStore) -> CoreResult<()> {
        let previous = previous.trim();
        let next = next.trim();
        if previous.is_empty() {
            store.add_goal(next);
        } else {
            store.goal_transition(previous, next);
        }
        log::info!("[goals] Goal shift: '{}' -> '{}'", previous, next);
        self.goal.set(next)
    }
}
