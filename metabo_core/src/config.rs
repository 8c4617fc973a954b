//! Engine configuration, loaded from TOML.
//!
//! Every field has a default, so a partial file (or none at all) works:
//!
//! ```toml
//! data_dir = "data"
//!
//! [graph]
//! fuzzy_merge = true
//! fuzzy_threshold = 0.85
//! record_insights = true
//!
//! [context]
//! max_facts = 20
//!
//! [mode]
//! vote_threshold = 2
//! heartbeat_interval = 10
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use metabo_rules::RulesConfig;
use serde::{Deserialize, Serialize};

use crate::context_assembler::ActivationConfig;
use crate::error::{CoreError, CoreResult};
use crate::parsing::MAX_TRIPLES;

/// File names inside the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub graph: String,
    pub goal: String,
    pub reflection: String,
    pub last_entropy: String,
    pub cycle_log: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            graph: "metabo_graph.json".to_string(),
            goal: "goal.txt".to_string(),
            reflection: "last_reflection.txt".to_string(),
            last_entropy: "last_entropy.txt".to_string(),
            cycle_log: "metabo_log.jsonl".to_string(),
        }
    }
}

/// Knowledge graph options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Resolve near-duplicate labels on merge.
    pub fuzzy_merge: bool,
    /// Edit similarity above which two labels are treated as one.
    pub fuzzy_threshold: f64,
    /// Record each cycle's input and reflection as graph nodes.
    pub record_insights: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            fuzzy_merge: true,
            fuzzy_threshold: 0.85,
            record_insights: true,
        }
    }
}

impl GraphConfig {
    /// The merge threshold, or `None` when fuzzy merging is off.
    pub fn fuzzy(&self) -> Option<f64> {
        self.fuzzy_merge.then_some(self.fuzzy_threshold)
    }
}

/// Fact extraction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Upper bound on facts merged per cycle.
    pub max_triples: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_triples: MAX_TRIPLES,
        }
    }
}

/// Prompt texts handed to the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// System prompt for directed-mode reflections.
    pub reflection: String,
    /// System prompt for subgoal decomposition.
    pub subgoals: String,
    /// User prompt for system-driven cycles; `{goal}` and `{delta}` are filled in.
    pub tick: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            reflection: "You are the reflective core of a learning system. Given the active goal, \
                its subgoals, the known facts, and the latest input, write a short reflection \
                that moves the goal forward. State each new insight as a plain sentence."
                .to_string(),
            subgoals: "Break the following goal into 2 to 5 actionable subgoals. Phrase each \
                subgoal as a short sentence. Return a JSON list of strings."
                .to_string(),
            tick: "The active goal is: {goal}. Structural entropy changed by {delta} since the \
                last cycle. Reflect briefly on what to explore next."
                .to_string(),
        }
    }
}

impl PromptConfig {
    /// The tick prompt for `goal` and an entropy drift.
    pub fn tick_prompt(&self, goal: &str, drift: f64) -> String {
        let goal = if goal.trim().is_empty() { "(none)" } else { goal.trim() };
        self.tick
            .replace("{goal}", goal)
            .replace("{delta}", &format!("{:+.3}", drift))
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the graph, scalar files, and cycle log.
    pub data_dir: PathBuf,
    pub files: FileNames,
    pub graph: GraphConfig,
    pub context: ActivationConfig,
    pub extraction: ExtractionConfig,
    pub prompts: PromptConfig,
    /// `[mode]` and `[goals]` tables.
    #[serde(flatten)]
    pub rules: RulesConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            files: FileNames::default(),
            graph: GraphConfig::default(),
            context: ActivationConfig::default(),
            extraction: ExtractionConfig::default(),
            prompts: PromptConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with every file under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(source: &str) -> CoreResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a TOML file. Errors if it cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Load from a TOML file, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(CoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("[config] No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("[config] {}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn graph_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.graph)
    }

    pub fn goal_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.goal)
    }

    pub fn reflection_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.reflection)
    }

    pub fn last_entropy_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.last_entropy)
    }

    pub fn cycle_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.cycle_log)
    }
}
