//! Error taxonomy for the retrieval core
//!
//! Every failure surfaces as its own variant so callers can tell a bad
//! request apart from a broken embedder or a storage fault.

use thiserror::Error;

use super::document::DocumentId;

#[derive(Debug, Error)]
pub enum Error {
    /// Vector length disagrees with the store's fixed dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector holds NaN or an infinity
    #[error("Vector has a non-finite value at index {index}")]
    NonFiniteVector { index: usize },

    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("Nothing to ingest: input is empty")]
    EmptyInput,

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Missing required metadata key: {0}")]
    MissingMetadata(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageFailure(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::StorageFailure(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::StorageFailure(format!("corrupt metadata: {}", e))
    }
}
