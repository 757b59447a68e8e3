//! Error types for tallyflow
//!
//! The pure pipeline stages (idle detection, classification, heuristics)
//! never raise errors for data-shape reasons; malformed payloads are
//! filtered out before those stages run and reported per payload. Store
//! failures carry their own error type in `ingest::store`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    TimestampError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
