//! Knowledge Base module - the persistent multi-relational concept graph.
//!
//! The knowledge graph consists of:
//! - **Concept nodes**: keyed by normalized label, carrying type and provenance tags
//! - **Relation edges**: directed, labeled (subject, relation, object) facts
//! - **Goal transitions**: edges recording how the active goal evolved
//! - **Insights**: per-cycle input and reflection nodes
//!
//! [`GraphStore`] wraps the in-memory graph with write-through persistence.

mod graph;
mod insight;
mod node;
mod relation;
mod store;

pub use graph::*;
pub use insight::*;
pub use node::*;
pub use relation::*;
pub use store::*;
