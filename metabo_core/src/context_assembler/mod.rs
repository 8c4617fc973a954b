//! Context Assembler - Builds bounded graph context for collaborator prompts.
//!
//! The spreading activation algorithm works as follows:
//! 1. **Trigger**: The active goal node plus any node labels the goal mentions
//! 2. **Activation**: Initialize trigger nodes with energy
//! 3. **Spreading**: Energy spreads along edges in both directions
//! 4. **Filtering**: Collect "hot" nodes above a threshold
//! 5. **Selection**: Rank edges by the energy of their endpoints
//! 6. **Assembly**: Render goal, subgoals, and facts as a prompt section
//!
//! When nothing in the graph matches the goal, the most connected edges are
//! used instead so the prompt is never starved of context on a non-empty graph.

mod activation;

pub use activation::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::knowledge_base::{normalize_label, EdgeKind, KnowledgeGraph, Triple};

/// Labels shorter than this are not matched inside goal text.
const MIN_MENTION_LEN: usize = 3;

/// Configuration for the spreading activation algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Initial energy given to trigger nodes.
    pub initial_energy: f32,

    /// Fraction of energy passed across one edge (0.0-1.0).
    pub decay_rate: f32,

    /// Maximum depth of spreading.
    pub max_depth: u32,

    /// Minimum energy threshold for inclusion.
    pub energy_threshold: f32,

    /// Maximum number of facts to include in context.
    pub max_facts: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            initial_energy: 1.0,
            decay_rate: 0.5,
            max_depth: 2,
            energy_threshold: 0.1,
            max_facts: 20,
        }
    }
}

/// The context assembler selects the part of the graph relevant to a goal.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: ActivationConfig,
}

impl ContextAssembler {
    pub fn new(config: ActivationConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ActivationConfig::default())
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    /// Node labels that seed activation for `goal`: the goal node itself and
    /// every existing label mentioned in the goal text.
    pub fn trigger_labels(&self, graph: &KnowledgeGraph, goal: &str) -> Vec<String> {
        let goal = normalize_label(goal);
        if goal.is_empty() {
            return Vec::new();
        }
        let lowered = goal.to_lowercase();

        let mut triggers = Vec::new();
        if graph.contains(&goal) {
            triggers.push(goal.clone());
        }
        for node in graph.nodes() {
            if node.label == goal || node.label.chars().count() < MIN_MENTION_LEN {
                continue;
            }
            if lowered.contains(&node.label.to_lowercase()) {
                triggers.push(node.label.clone());
            }
        }
        triggers
    }

    /// Run spreading activation from `triggers`.
    ///
    /// Each round, every node above the threshold passes
    /// `energy * decay_rate` to each distinct neighbor.
    pub fn spread_activation(&self, graph: &KnowledgeGraph, triggers: &[String]) -> ActivationState {
        let mut state = ActivationState::new();

        for label in triggers {
            state.add_energy(label.as_str(), self.config.initial_energy);
        }

        for _depth in 0..self.config.max_depth {
            let mut new_energies: HashMap<String, f32> = HashMap::new();

            for (label, energy) in state.iter_energies() {
                if energy < self.config.energy_threshold {
                    continue;
                }
                for neighbor in graph.neighbors(label) {
                    *new_energies.entry(neighbor.to_string()).or_default() +=
                        energy * self.config.decay_rate;
                }
            }

            for (label, energy) in new_energies {
                state.add_energy(label, energy);
            }
        }

        state
    }

    /// Edges ranked by the summed energy of their endpoints.
    ///
    /// Insight edges are cycle bookkeeping, not facts, and are skipped.
    pub fn collect_facts(&self, graph: &KnowledgeGraph, activation: &ActivationState) -> Vec<Triple> {
        let mut scored: Vec<(usize, f32)> = graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.kind != EdgeKind::Insight)
            .filter_map(|(i, edge)| {
                let energy = [edge.subject.as_str(), edge.object.as_str()]
                    .iter()
                    .map(|l| activation.get_energy(l))
                    .filter(|e| *e >= self.config.energy_threshold)
                    .sum::<f32>();
                (energy > 0.0).then_some((i, energy))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(self.config.max_facts)
            .map(|(i, _)| graph.edges()[i].triple())
            .collect()
    }

    /// Edges whose endpoints have the highest combined degree.
    pub fn fallback_facts(&self, graph: &KnowledgeGraph) -> Vec<Triple> {
        let mut scored: Vec<(usize, usize)> = graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.kind != EdgeKind::Insight)
            .map(|(i, edge)| (i, graph.degree(&edge.subject) + graph.degree(&edge.object)))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored
            .into_iter()
            .take(self.config.max_facts)
            .map(|(i, _)| graph.edges()[i].triple())
            .collect()
    }

    /// Assemble the context for `goal`.
    pub fn assemble(&self, graph: &KnowledgeGraph, goal: &str, subgoals: &[String]) -> AssembledContext {
        let triggers = self.trigger_labels(graph, goal);
        let activation = self.spread_activation(graph, &triggers);
        if let Some((hottest, energy)) = activation.hottest_node() {
            log::debug!(
                "[context] Activated {} nodes with {:.2} total energy, hottest '{}' ({:.2})",
                activation.active_count(),
                activation.total_energy(),
                hottest,
                energy
            );
        }
        let mut facts = self.collect_facts(graph, &activation);

        let fallback = facts.is_empty();
        if fallback {
            facts = self.fallback_facts(graph);
            log::debug!("[context] No goal match, using {} central facts", facts.len());
        }

        AssembledContext {
            goal: normalize_label(goal),
            subgoals: subgoals.to_vec(),
            facts,
            activated: activation
                .hot_nodes(self.config.energy_threshold)
                .into_iter()
                .map(|(label, energy)| (label.to_string(), energy))
                .collect(),
            fallback,
        }
    }
}

/// The assembled context ready for prompt generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub goal: String,

    pub subgoals: Vec<String>,

    /// Facts selected from the knowledge graph.
    pub facts: Vec<Triple>,

    /// Nodes that were activated with their energy levels.
    pub activated: Vec<(String, f32)>,

    /// True when facts came from the degree fallback rather than activation.
    pub fallback: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.goal.is_empty() && self.subgoals.is_empty() && self.facts.is_empty()
    }

    /// Format the context as a prompt string.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        if !self.goal.is_empty() {
            prompt.push_str("## Active Goal\n");
            prompt.push_str(&self.goal);
            prompt.push_str("\n\n");
        }

        if !self.subgoals.is_empty() {
            prompt.push_str("## Subgoals\n");
            for subgoal in &self.subgoals {
                prompt.push_str(&format!("- {}\n", subgoal));
            }
            prompt.push('\n');
        }

        if !self.facts.is_empty() {
            prompt.push_str("## Known Facts\n");
            for fact in &self.facts {
                prompt.push_str(&format!(
                    "- {} {} {}\n",
                    fact.subject, fact.relation, fact.object
                ));
            }
            prompt.push('\n');
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::{CycleInsight, NodeKind, Provenance, INPUT_PREFIX, SERVES_GOAL};

    fn setup_test_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.merge(
            &[
                Triple::new("Music", "causes", "Joy"),
                Triple::new("Joy", "supports", "Learning"),
                Triple::new("Rhythm", "structures", "Music"),
                Triple::new("Weather", "affects", "Mood"),
            ],
            NodeKind::Concept,
            Provenance::Llm,
            None,
        );
        graph
    }

    #[test]
    fn test_trigger_labels_from_goal_text() {
        let graph = setup_test_graph();
        let assembler = ContextAssembler::with_defaults();

        let triggers = assembler.trigger_labels(&graph, "Understand how music shapes us");
        assert_eq!(triggers, vec!["Music"]);
        assert!(assembler.trigger_labels(&graph, "").is_empty());
    }

    #[test]
    fn test_goal_node_is_a_trigger() {
        let mut graph = setup_test_graph();
        graph.add_goal("Explore rhythm");
        let assembler = ContextAssembler::with_defaults();

        let triggers = assembler.trigger_labels(&graph, "Explore rhythm");
        assert_eq!(triggers[0], "Explore rhythm");
        assert!(triggers.contains(&"Rhythm".to_string()));
    }

    #[test]
    fn test_activation_decay() {
        let graph = setup_test_graph();
        let config = ActivationConfig {
            max_depth: 1,
            energy_threshold: 0.01,
            ..ActivationConfig::default()
        };
        let assembler = ContextAssembler::new(config);
        let activation = assembler.spread_activation(&graph, &["Music".to_string()]);

        // Depth 1: Music=1.0, Joy and Rhythm=0.5, Learning untouched
        assert!(activation.get_energy("Music") > activation.get_energy("Joy"));
        assert!((activation.get_energy("Rhythm") - 0.5).abs() < 0.001);
        assert!(!activation.is_active("Learning"));
    }

    #[test]
    fn test_activation_multi_hop() {
        let graph = setup_test_graph();
        let config = ActivationConfig {
            energy_threshold: 0.01,
            ..ActivationConfig::default()
        };
        let assembler = ContextAssembler::new(config);
        let activation = assembler.spread_activation(&graph, &["Music".to_string()]);

        assert!(activation.get_energy("Joy") > activation.get_energy("Learning"));
        assert!(activation.is_active("Learning"));
        assert!(!activation.is_active("Weather"));
    }

    #[test]
    fn test_collect_facts_stays_near_goal() {
        let graph = setup_test_graph();
        let assembler = ContextAssembler::with_defaults();

        let context = assembler.assemble(&graph, "music", &[]);
        assert!(!context.fallback);
        assert!(context.facts.contains(&Triple::new("Music", "causes", "Joy")));
        assert!(!context.facts.contains(&Triple::new("Weather", "affects", "Mood")));
        assert_eq!(context.activated[0].0, "Music");
    }

    #[test]
    fn test_fallback_uses_central_edges() {
        let graph = setup_test_graph();
        let config = ActivationConfig {
            max_facts: 1,
            ..ActivationConfig::default()
        };
        let assembler = ContextAssembler::new(config);

        let context = assembler.assemble(&graph, "Something unrelated", &[]);
        assert!(context.fallback);
        assert_eq!(context.facts, vec![Triple::new("Music", "causes", "Joy")]);
    }

    #[test]
    fn test_insight_edges_are_not_facts() {
        let mut graph = setup_test_graph();
        graph.add_insight(&CycleInsight {
            cycle: "c1".to_string(),
            input: "Tell me about music".to_string(),
            goal: "Music".to_string(),
            reflection: "Music causes joy.".to_string(),
            reading: metabo_rules::interpret(0.0, 0.0),
            source: Provenance::User,
        });
        let assembler = ContextAssembler::with_defaults();

        let context = assembler.assemble(&graph, "Music", &[]);
        assert!(!context.facts.is_empty());
        assert!(context.facts.iter().all(|f| f.relation != SERVES_GOAL));
        assert!(context.activated.iter().any(|(label, _)| label == "input:Tell me about music"));

        let fallback = assembler.fallback_facts(&graph);
        assert!(fallback.iter().all(|f| !f.subject.starts_with(INPUT_PREFIX)));
    }

    #[test]
    fn test_empty_graph_gives_empty_facts() {
        let assembler = ContextAssembler::with_defaults();
        let context = assembler.assemble(&KnowledgeGraph::new(), "", &[]);
        assert!(context.is_empty());
        assert_eq!(context.to_prompt_string(), "");
    }

    #[test]
    fn test_context_to_prompt() {
        let context = AssembledContext {
            goal: "Explore music".to_string(),
            subgoals: vec!["Listen".to_string(), "Compare".to_string()],
            facts: vec![Triple::new("Music", "causes", "Joy")],
            activated: vec![],
            fallback: false,
        };

        let prompt = context.to_prompt_string();
        assert!(prompt.contains("## Active Goal\nExplore music"));
        assert!(prompt.contains("- Compare\n"));
        assert!(prompt.contains("- Music causes Joy\n"));
    }
}
