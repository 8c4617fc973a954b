//! # Metabo Core
//!
//! The stateful half of the Metabo cycle engine. Each cycle takes a piece of
//! text, grows a persistent knowledge graph from it, measures how the graph's
//! structural disorder changed, and decides whether the next cycle should
//! reflect or pursue the active goal. The pure rules live in `metabo_rules`.
//!
//! ## Core Components
//!
//! - **knowledge_base**: Concept graph with idempotent merges and write-through persistence
//! - **context_assembler**: Selects goal-relevant facts using spreading activation
//! - **goals**: Detects, confirms, and records goal shifts; decomposes goals
//! - **collaborator**: The boundary to an outside model, with validated payloads
//! - **parsing**: Pulls JSON, triples, and subgoals out of free-form responses
//! - **persistence**: Scalar state files and the append-only cycle log
//! - **cycle**: The orchestrator that sequences one full turn
//!
//! ## Design Philosophy
//!
//! - **Owned State**: One engine value owns every store; nothing is global
//! - **Graceful Degradation**: Every collaborator call has a local fallback
//! - **Append-Only Memory**: Nodes and edges grow, cycle records are never rewritten

pub mod collaborator;
pub mod config;
pub mod context_assembler;
pub mod cycle;
pub mod error;
pub mod goals;
pub mod knowledge_base;
pub mod parsing;
pub mod persistence;

pub use collaborator::*;
pub use config::*;
pub use context_assembler::*;
pub use cycle::*;
pub use error::*;
pub use goals::*;
pub use knowledge_base::*;
pub use parsing::*;
pub use persistence::*;

pub use metabo_rules;
