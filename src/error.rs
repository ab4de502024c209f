//! Error types for the Nocturne engine

use thiserror::Error;

/// Errors that can occur during engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A store/cache collaborator failed; the timeline is left unmodified
    /// and the paging guard flags are cleared so the caller can retry.
    #[error("Store fetch failed: {0}")]
    Store(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Calendar arithmetic could not produce a valid instant. Surfaced
    /// rather than silently substituted, so timezone bugs stay visible.
    #[error("Date arithmetic failed: {0}")]
    DateArithmetic(String),

    #[error("Time parse error: {0}")]
    TimeParse(String),
}
