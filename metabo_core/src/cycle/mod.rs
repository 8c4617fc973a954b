//! Cycle Orchestrator - runs one full turn of the engine.
//!
//! A cycle proceeds as follows:
//! 1. **Resolve**: read the current mode, active goal, last reflection, and progress
//! 2. **Goal shift**: propose, confirm, and apply a new goal
//! 3. **Plan**: decompose the goal into subgoals
//! 4. **Act**: in directed mode, gather context, reflect, and merge new facts;
//!    in reflective mode, reuse the last reflection and add nothing
//! 5. **Feel**: score entropy before and after, interpret the change
//! 6. **Decide**: recompute the next mode, letting a valid collaborator vote win
//! 7. **Record**: append a [`CycleRecord`] to the cycle log
//! 8. **Persist**: store the reflection and the new entropy, then record the
//!    cycle's input and reflection as insight nodes in the graph
//!
//! Collaborator failures never abort a cycle; each step falls back and a
//! record is always produced.

mod record;

pub use record::*;

use metabo_rules::{
    analyse, explain, interpret, score, Mode, ModeController, ModeDecision, ModeInputs,
    StructuralMetrics,
};
use serde::{Deserialize, Serialize};

use crate::collaborator::{Collaborator, ModeMetrics};
use crate::config::EngineConfig;
use crate::context_assembler::{AssembledContext, ContextAssembler};
use crate::goals::{decompose, GoalTracker};
use crate::knowledge_base::{CycleInsight, GraphStore, MergeReport, NodeKind, Provenance, Triple};
use crate::parsing::{dedup_triples, extract_triples};
use crate::persistence::{CycleLog, ScalarStore};

/// Everything a cycle produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub record: CycleRecord,
    /// The goal the cycle worked on.
    pub goal: String,
    /// Set when this cycle shifted the goal.
    pub new_goal: Option<String>,
    pub subgoals: Vec<String>,
    pub context: AssembledContext,
    /// Present when the cycle merged facts.
    pub merge: Option<MergeReport>,
    /// The local controller's decision before any collaborator vote.
    pub decision: ModeDecision,
    /// The mode the next cycle runs in.
    pub next_mode: Mode,
    /// Rationale of an adopted collaborator mode vote.
    pub rationale: Option<String>,
}

/// Result of a system-driven cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickOutcome {
    /// Entropy now minus the last stored entropy, before the cycle ran.
    pub drift: f64,
    /// The self-generated input the cycle ran on.
    pub base_reflection: String,
    pub cycle: CycleOutcome,
}

/// The engine: owns every piece of state and the collaborator.
///
/// All mutation goes through `&mut self`, so a shared engine needs an
/// outer lock and cycles never overlap.
pub struct CycleEngine<C: Collaborator> {
    config: EngineConfig,
    store: GraphStore,
    goals: GoalTracker,
    controller: ModeController,
    scalars: ScalarStore,
    log: CycleLog,
    assembler: ContextAssembler,
    collaborator: C,
}

impl<C: Collaborator> CycleEngine<C> {
    /// Open an engine backed by the files under `config.data_dir`.
    pub fn open(config: EngineConfig, collaborator: C) -> Self {
        let store = GraphStore::open(config.graph_path()).with_fuzzy_threshold(config.graph.fuzzy());
        let goals = GoalTracker::open(config.goal_path(), config.rules.goals.clone());
        let scalars = ScalarStore::open(config.reflection_path(), config.last_entropy_path());
        let log = CycleLog::open(config.cycle_log_path());
        log::info!(
            "[cycle] Engine opened at {} ({} nodes, goal '{}')",
            config.data_dir.display(),
            store.graph().node_count(),
            goals.active()
        );
        Self::from_parts(config, store, goals, scalars, log, collaborator)
    }

    /// An engine that keeps all state in memory.
    pub fn in_memory(config: EngineConfig, collaborator: C) -> Self {
        let store = GraphStore::in_memory().with_fuzzy_threshold(config.graph.fuzzy());
        let goals = GoalTracker::in_memory(config.rules.goals.clone());
        Self::from_parts(
            config,
            store,
            goals,
            ScalarStore::in_memory(),
            CycleLog::disabled(),
            collaborator,
        )
    }

    fn from_parts(
        config: EngineConfig,
        store: GraphStore,
        goals: GoalTracker,
        scalars: ScalarStore,
        log: CycleLog,
        collaborator: C,
    ) -> Self {
        Self {
            controller: ModeController::new(config.rules.mode.clone()),
            assembler: ContextAssembler::new(config.context.clone()),
            config,
            store,
            goals,
            scalars,
            log,
            collaborator,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn goals(&self) -> &GoalTracker {
        &self.goals
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn scalars(&self) -> &ScalarStore {
        &self.scalars
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    /// The mode the next cycle runs in.
    pub fn mode(&self) -> Mode {
        self.controller.current()
    }

    /// Pin the mode until [`clear_override`](Self::clear_override).
    pub fn set_override(&mut self, mode: Mode) {
        self.controller.set_override(mode);
    }

    pub fn clear_override(&mut self) {
        self.controller.clear_override();
    }

    /// Current structural entropy of the graph.
    pub fn entropy(&self) -> f64 {
        score(&self.store.graph().topology())
    }

    /// Raw structural signals of the graph.
    pub fn metrics(&self) -> StructuralMetrics {
        analyse(&self.store.graph().topology())
    }

    /// Human-readable explanation of the current entropy.
    pub fn explain(&self) -> String {
        explain(&self.store.graph().topology())
    }

    /// Run one cycle on `input`.
    pub fn run_cycle(&mut self, input: &str, source: InputSource) -> CycleOutcome {
        // 1. Resolve state
        let mode = self.controller.current();
        let mut goal = self.goals.active().to_string();
        let last_reflection = self.scalars.reflection().to_string();
        let completed_subgoals = self.store.graph().goal_path().len().saturating_sub(1);

        // 2. Goal shift
        let mut new_goal = None;
        if let Some(candidate) = self.goals.propose_shift(input, &goal, &self.collaborator) {
            if self.goals.confirm_shift(&goal, &candidate, &self.collaborator) {
                if let Err(e) = self.goals.apply_shift(&goal, &candidate, &mut self.store) {
                    log::warn!("[cycle] Failed to store goal: {}", e);
                }
                goal = candidate.clone();
                new_goal = Some(candidate);
            }
        }

        // 3. Subgoals
        let subgoals = decompose(
            &goal,
            &last_reflection,
            &self.config.prompts.subgoals,
            &self.collaborator,
        );

        // 4. Act
        let entropy_before = self.entropy();
        let context = self.assembler.assemble(self.store.graph(), &goal, &subgoals);

        let (reflection, merge) = match mode {
            Mode::Directed => self.directed_step(input, &last_reflection, &context),
            Mode::Reflective => (last_reflection.clone(), None),
        };
        let triples = merge
            .as_ref()
            .map(|report| report.merged.clone())
            .unwrap_or_default();

        // 5. Feel
        let entropy_after = self.entropy();
        let reading = interpret(entropy_before, entropy_after);

        // 6. Decide
        let decision = self.controller.decide(
            &ModeInputs::new(input)
                .with_delta(reading.delta)
                .with_emotion(reading.polarity.as_str())
                .with_completed_subgoals(completed_subgoals),
        );
        let metrics = ModeMetrics::new(
            entropy_before,
            entropy_after,
            &reading,
            &decision,
            completed_subgoals,
        );
        let mut rationale = None;
        if self.controller.override_mode().is_none() {
            if let Some(verdict) = self
                .collaborator
                .decide_mode(input, &metrics)
                .or_log("decide_mode")
            {
                log::info!("[cycle] Collaborator chose {} ({})", verdict.mode, verdict.rationale);
                self.controller.adopt(verdict.mode);
                rationale = Some(verdict.rationale);
            }
        }
        let next_mode = self.controller.current();

        // 7. Record
        let record = CycleRecord::new(
            input,
            source,
            mode,
            &reflection,
            triples,
            entropy_before,
            entropy_after,
            &reading,
        );
        if let Err(e) = self.log.append(&record) {
            log::warn!("[cycle] Failed to append cycle record: {}", e);
        }

        // 8. Persist
        if let Err(e) = self.scalars.set_reflection(&reflection) {
            log::warn!("[cycle] Failed to store reflection: {}", e);
        }
        if let Err(e) = self.scalars.set_last_entropy(entropy_after) {
            log::warn!("[cycle] Failed to store entropy: {}", e);
        }
        if self.config.graph.record_insights {
            self.store.record_insight(&CycleInsight {
                cycle: record.id.to_string(),
                input: input.to_string(),
                goal: goal.clone(),
                reflection: reflection.clone(),
                reading,
                source: source.into(),
            });
        }

        log::info!(
            "[cycle] {} cycle {}: entropy {:.3} -> {:.3} ({}, {}), next {}",
            mode,
            record.id,
            entropy_before,
            entropy_after,
            reading.polarity,
            reading.intensity,
            next_mode
        );

        CycleOutcome {
            record,
            goal,
            new_goal,
            subgoals,
            context,
            merge,
            decision,
            next_mode,
            rationale,
        }
    }

    /// Run a system-driven cycle on a self-generated reflection.
    ///
    /// The collaborator is asked to reflect on the goal and the entropy drift
    /// since the last stored value; without an answer the last reflection is
    /// used, then the goal itself.
    pub fn tick(&mut self) -> TickOutcome {
        let goal = self.goals.active().to_string();
        let drift = self.entropy() - self.scalars.last_entropy();
        let prompt = self.config.prompts.tick_prompt(&goal, drift);

        let base_reflection = self
            .collaborator
            .generate(self.controller.current().hint(), &prompt)
            .or_log("tick")
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| {
                let last = self.scalars.reflection();
                if last.is_empty() {
                    goal.clone()
                } else {
                    last.to_string()
                }
            });

        log::debug!("[cycle] Tick with drift {:+.3}", drift);
        let cycle = self.run_cycle(&base_reflection, InputSource::System);
        TickOutcome {
            drift,
            base_reflection,
            cycle,
        }
    }

    /// Reflect on the input and merge the facts it yields.
    ///
    /// Without a fresh reflection the previous one is kept and nothing is merged.
    fn directed_step(
        &mut self,
        input: &str,
        last_reflection: &str,
        context: &AssembledContext,
    ) -> (String, Option<MergeReport>) {
        let system_prompt = format!(
            "{}\n\n{}",
            Mode::Directed.hint(),
            self.config.prompts.reflection
        );
        let mut request = context.to_prompt_string();
        request.push_str(&format!("## Input\n{}\n", input.trim()));
        if !last_reflection.is_empty() {
            request.push_str(&format!("\n## Last Reflection\n{}\n", last_reflection));
        }

        let Some(reflection) = self
            .collaborator
            .generate(&system_prompt, &request)
            .or_log("generate")
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
        else {
            return (last_reflection.to_string(), None);
        };

        let max = self.config.extraction.max_triples;
        let triples: Vec<Triple> = match self
            .collaborator
            .extract_facts(&reflection)
            .or_log("extract_facts")
        {
            Some(facts) => dedup_triples(facts, max),
            None => extract_triples(&reflection, max),
        };

        let report = self
            .store
            .merge(&triples, NodeKind::Concept, Provenance::Llm);
        log::debug!(
            "[cycle] Merged {} new edges, {} duplicates, {} dropped",
            report.inserted_edges,
            report.duplicate_edges,
            report.dropped.len()
        );
        (reflection, Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{ModeVerdict, Offline, Outcome};
    use crate::knowledge_base::{EdgeKind, REFLECTS_ON, SERVES_GOAL};
    use metabo_rules::{Intensity, Polarity};
    use serde_json::Value;
    use tempfile::TempDir;

    /// Collaborator with canned answers.
    #[derive(Default)]
    struct Scripted {
        reflection: Option<&'static str>,
        facts: Option<Vec<Triple>>,
        verdict: Option<ModeVerdict>,
    }

    impl Collaborator for Scripted {
        fn generate(&self, _system_prompt: &str, context: &str) -> Outcome<String> {
            if context.starts_with("Goal: ") {
                return Outcome::Unavailable;
            }
            match self.reflection {
                Some(text) => Outcome::Ok(text.to_string()),
                None => Outcome::Unavailable,
            }
        }

        fn extract_facts(&self, _text: &str) -> Outcome<Vec<Triple>> {
            match &self.facts {
                Some(facts) => Outcome::Ok(facts.clone()),
                None => Outcome::Unavailable,
            }
        }

        fn decide_mode(&self, _text: &str, _metrics: &ModeMetrics) -> Outcome<ModeVerdict> {
            match &self.verdict {
                Some(verdict) => Outcome::Ok(verdict.clone()),
                None => Outcome::Malformed("no verdict scripted".to_string()),
            }
        }
    }

    fn relation_edges<C: Collaborator>(engine: &CycleEngine<C>) -> usize {
        engine
            .store()
            .graph()
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::Relation)
            .count()
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn music_collaborator() -> Scripted {
        Scripted {
            reflection: Some("Music causes joy."),
            facts: Some(vec![Triple::new("Music", "causes", "Joy")]),
            ..Scripted::default()
        }
    }

    #[test]
    fn test_directed_cycle_merges_facts() {
        init_logger();
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), music_collaborator());

        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);

        assert_eq!(outcome.new_goal.as_deref(), Some("Untersuche Musik"));
        assert_eq!(outcome.subgoals, vec!["Untersuche Musik"]);
        assert_eq!(outcome.record.mode, Mode::Directed);
        assert_eq!(outcome.record.reflection, "Music causes joy.");
        assert_eq!(outcome.record.triples, vec![Triple::new("Music", "causes", "Joy")]);
        assert!(outcome.record.entropy_after > outcome.record.entropy_before);
        assert_eq!(outcome.record.emotion, Polarity::Negative);
        assert_eq!(engine.scalars().reflection(), "Music causes joy.");
        assert_eq!(engine.scalars().last_entropy(), outcome.record.entropy_after);
        assert!(engine.store().graph().has_edge("Music", "causes", "Joy"));
    }

    #[test]
    fn test_reflective_cycle_reuses_reflection() {
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), music_collaborator());
        engine.run_cycle("Untersuche Musik", InputSource::User);
        let facts = relation_edges(&engine);

        engine.set_override(Mode::Reflective);
        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);

        assert_eq!(outcome.record.mode, Mode::Reflective);
        assert_eq!(outcome.record.reflection, "Music causes joy.");
        assert!(outcome.record.triples.is_empty());
        assert!(outcome.merge.is_none());
        assert_eq!(outcome.record.delta, 0.0);
        assert_eq!(relation_edges(&engine), facts);
        assert_eq!(outcome.next_mode, Mode::Reflective);
    }

    #[test]
    fn test_cycle_records_insight() {
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), music_collaborator());
        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);
        let graph = engine.store().graph();

        let input = graph.node("input:Untersuche Musik").unwrap();
        assert!(input.has_kind(&NodeKind::Input));
        assert!(input.sources.contains(&Provenance::User));
        assert!(graph.has_edge("input:Untersuche Musik", SERVES_GOAL, "Untersuche Musik"));

        let label = format!("reflection:{}", outcome.record.id);
        let reflection = graph.node(&label).unwrap();
        assert!(reflection.has_kind(&NodeKind::Reflection));
        assert_eq!(reflection.text, "Music causes joy.");
        assert_eq!(reflection.metadata["emotion"], outcome.record.emotion.as_str());
        assert_eq!(reflection.metadata["delta"].as_f64(), Some(outcome.record.delta));
        assert!(graph.has_edge(&label, REFLECTS_ON, "input:Untersuche Musik"));

        assert_eq!(graph.goal_path(), vec!["Untersuche Musik"]);
        assert!(!outcome.context.facts.iter().any(|f| f.relation == SERVES_GOAL));
    }

    #[test]
    fn test_insights_can_be_disabled() {
        let mut config = EngineConfig::default();
        config.graph.record_insights = false;
        let mut engine = CycleEngine::in_memory(config, music_collaborator());
        engine.run_cycle("Untersuche Musik", InputSource::User);

        let graph = engine.store().graph();
        assert_eq!(graph.nodes_of_kind(&NodeKind::Input).count(), 0);
        assert_eq!(graph.nodes_of_kind(&NodeKind::Reflection).count(), 0);
    }

    #[test]
    fn test_failed_writes_do_not_abort_cycle() {
        init_logger();
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "a regular file").unwrap();
        let mut engine = CycleEngine::open(EngineConfig::with_data_dir(&blocker), music_collaborator());

        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);

        assert_eq!(outcome.record.input, "Untersuche Musik");
        assert_eq!(outcome.record.triples, vec![Triple::new("Music", "causes", "Joy")]);
        assert!(engine.store().graph().has_edge("Music", "causes", "Joy"));
        assert!(engine.store().graph().contains("input:Untersuche Musik"));
        assert_eq!(engine.goals().active(), "Untersuche Musik");
        assert_eq!(engine.scalars().reflection(), "Music causes joy.");
        assert!(engine.store().persist().is_err());
        assert!(blocker.is_file());
    }

    #[test]
    fn test_extraction_falls_back_to_local_parsing() {
        let collaborator = Scripted {
            reflection: Some(r#"[["Rhythm", "shapes", "Dance"], ["Rhythm", "shapes", "Dance"]]"#),
            ..Scripted::default()
        };
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), collaborator);

        let outcome = engine.run_cycle("Explore rhythm", InputSource::User);
        assert_eq!(outcome.record.triples, vec![Triple::new("Rhythm", "shapes", "Dance")]);
        assert_eq!(outcome.merge.unwrap().inserted_edges, 1);
    }

    #[test]
    fn test_offline_cycle_still_records() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::with_data_dir(dir.path());
        let mut engine = CycleEngine::open(config.clone(), Offline);

        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);
        assert_eq!(outcome.record.reflection, "");
        assert!(outcome.record.triples.is_empty());
        assert_eq!(outcome.record.intensity, Intensity::Low);
        assert!(outcome.rationale.is_none());

        let records: Vec<Value> = CycleLog::open(config.cycle_log_path()).read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["input"], "Untersuche Musik");
        assert_eq!(records[0]["source"], "user");
    }

    #[test]
    fn test_collaborator_mode_vote_is_adopted() {
        let collaborator = Scripted {
            verdict: Some(ModeVerdict {
                mode: Mode::Reflective,
                rationale: "needs consolidation".to_string(),
            }),
            ..music_collaborator()
        };
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), collaborator);

        let outcome = engine.run_cycle("Execute the plan", InputSource::User);
        assert_eq!(outcome.decision.mode, Mode::Directed);
        assert_eq!(outcome.next_mode, Mode::Reflective);
        assert_eq!(outcome.rationale.as_deref(), Some("needs consolidation"));
        assert_eq!(engine.mode(), Mode::Reflective);
    }

    #[test]
    fn test_override_ignores_collaborator_vote() {
        let collaborator = Scripted {
            verdict: Some(ModeVerdict {
                mode: Mode::Reflective,
                rationale: String::new(),
            }),
            ..music_collaborator()
        };
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), collaborator);
        engine.set_override(Mode::Directed);

        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);
        assert_eq!(outcome.next_mode, Mode::Directed);
        assert!(outcome.rationale.is_none());

        engine.clear_override();
        let outcome = engine.run_cycle("Untersuche Musik", InputSource::User);
        assert_eq!(outcome.next_mode, Mode::Reflective);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::with_data_dir(dir.path());
        {
            let mut engine = CycleEngine::open(config.clone(), music_collaborator());
            engine.run_cycle("Untersuche Musik", InputSource::User);
            engine.run_cycle("Explore weather patterns", InputSource::User);
        }

        let engine = CycleEngine::open(config, Offline);
        assert_eq!(engine.goals().active(), "Explore weather patterns");
        assert_eq!(
            engine.store().graph().goal_path(),
            vec!["Untersuche Musik", "Explore weather patterns"]
        );
        assert_eq!(engine.scalars().reflection(), "Music causes joy.");
        assert!(engine.entropy() > 0.0);
    }

    #[test]
    fn test_tick_runs_system_cycle() {
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), music_collaborator());
        engine.run_cycle("Untersuche Musik", InputSource::User);
        let drift = engine.entropy() - engine.scalars().last_entropy();

        let tick = engine.tick();
        assert_eq!(tick.base_reflection, "Music causes joy.");
        assert_eq!(tick.cycle.record.source, InputSource::System);
        assert!((tick.drift - drift).abs() < 1e-12);
    }

    #[test]
    fn test_tick_falls_back_to_goal() {
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), Offline);
        engine.run_cycle("Untersuche Musik", InputSource::User);

        let tick = engine.tick();
        assert_eq!(tick.base_reflection, "Untersuche Musik");
        assert_eq!(tick.cycle.goal, "Untersuche Musik");
        assert!(tick.cycle.new_goal.is_none());
    }

    #[test]
    fn test_heartbeat_inverts_mode() {
        let mut config = EngineConfig::default();
        config.rules.mode.heartbeat_interval = Some(2);
        let mut engine = CycleEngine::in_memory(config, Offline);

        let first = engine.run_cycle("act now", InputSource::User);
        assert_eq!(first.next_mode, Mode::Directed);

        let second = engine.run_cycle("act now", InputSource::User);
        assert_eq!(second.next_mode, Mode::Reflective);
        assert_eq!(second.decision.trigger, metabo_rules::DecisionTrigger::Heartbeat);
    }

    #[test]
    fn test_explain_and_metrics() {
        let mut engine = CycleEngine::in_memory(EngineConfig::default(), music_collaborator());
        engine.run_cycle("Untersuche Musik", InputSource::User);

        assert_eq!(engine.metrics().nodes, engine.store().graph().node_count());
        assert!(engine.explain().contains("Resulting entropy"));
    }
}
