//! Persistence module - small durable state outside the graph.
//!
//! - **Scalars**: active goal, last reflection, and last entropy, one text file each
//! - **Cycle log**: append-only JSON Lines record of every cycle

mod cycle_log;
mod scalar;

pub use cycle_log::*;
pub use scalar::*;
