//! Subgoal decomposition.

use crate::collaborator::Collaborator;
use crate::parsing::parse_subgoals;

/// Split `goal` into 2 to 5 subgoals with the collaborator's help.
///
/// The collaborator may answer with a JSON list of strings or with bullet
/// lines. Any failure yields `[goal]`; a blank goal yields nothing.
pub fn decompose<C: Collaborator>(
    goal: &str,
    reflection: &str,
    system_prompt: &str,
    collaborator: &C,
) -> Vec<String> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Vec::new();
    }

    let mut request = format!("Goal: {}", goal);
    if !reflection.trim().is_empty() {
        request.push_str(&format!("\nContext: {}", reflection.trim()));
    }

    let subgoals = collaborator
        .generate(system_prompt, &request)
        .or_log("decompose")
        .map(|text| parse_subgoals(&text))
        .unwrap_or_default();

    if subgoals.is_empty() {
        log::debug!("[goals] No subgoals parsed, keeping the goal as its only step");
        vec![goal.to_string()]
    } else {
        subgoals
    }
}
