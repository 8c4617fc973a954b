//! Error types for rule configuration and parsing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("invalid rules configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("unknown mode '{0}', expected 'reflective' or 'directed'")]
    UnknownMode(String),
}
