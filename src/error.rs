//! Error types
//!
//! None of these ever escape a pipeline run: engine errors are absorbed into
//! schema defaults by the agents. They exist for the seams where a caller can
//! still act on them (configuration loading, input gating, provider calls).

use thiserror::Error;

/// Failure of a single reasoning-engine call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("provider call failed: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("no {expected} found in response")]
    MissingDelimiters { expected: &'static str },

    #[error("response did not match schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Rejection of a narrative before it enters the pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("narrative is empty")]
    EmptyNarrative,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown provider kind: {0}")]
    UnknownProvider(String),
}
