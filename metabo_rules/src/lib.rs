//! # Metabo Rules
//!
//! The pure rule set of the Metabo cycle engine. Everything in this crate is
//! free of I/O and hidden state except the explicitly owned [`ModeController`].
//!
//! ## Core Components
//!
//! - **entropy**: Structural disorder score of a graph topology in `[0, 1]`
//! - **emotion**: Maps an entropy change to polarity and intensity
//! - **mode**: Hysteretic reflective/directed state machine
//! - **similarity**: Text and vector similarity helpers
//! - **config**: Tunable thresholds loaded from TOML

pub mod config;
pub mod emotion;
pub mod entropy;
pub mod error;
pub mod mode;
pub mod similarity;

pub use config::*;
pub use emotion::*;
pub use entropy::*;
pub use error::*;
pub use mode::*;
pub use similarity::*;
