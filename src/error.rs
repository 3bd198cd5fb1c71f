//! Error taxonomy for the retrieval path.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Failures surfaced by the retrieval components.
///
/// None of these escape [`crate::Retriever::relevant_context`]; that edge
/// collapses every variant into an empty context string.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query was empty or whitespace-only.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embeddings snapshot is missing, unreadable or fails validation.
    #[error("embedding store unavailable at {path}: {reason}")]
    StoreUnavailable {
        /// Snapshot location that failed to load.
        path: PathBuf,
        /// Human-readable cause.
        reason: String,
    },

    /// Query and stored vectors have different lengths.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the stored vector.
        expected: usize,
        /// Length of the query vector.
        actual: usize,
    },

    /// The embedding provider failed or timed out.
    #[error("query embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl RetrievalError {
    pub(crate) fn store_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
