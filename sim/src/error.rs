//! Error types for the simulation core.
//!
//! None of these ever escape a tick: the tick pipeline logs and absorbs them.
//! They surface only at the edges (decoding raw command records, loading
//! configuration).

use thiserror::Error;

/// Failure to decode a raw command record into a typed [`crate::Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command tag {0}")]
    UnknownTag(u32),
    #[error("unknown item code {0}")]
    UnknownItem(u64),
}

/// Failure to load a [`crate::SimConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse simulation config: {0}")]
    Parse(#[from] serde_json::Error),
}
