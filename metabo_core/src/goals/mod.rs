//! Goals module - the active goal and how it evolves.
//!
//! - **Tracker**: detects, confirms, and applies goal shifts
//! - **Subgoals**: splits the active goal into a few concrete steps

mod subgoals;
mod tracker;

pub use subgoals::*;
pub use tracker::*;
