//! semantic-docstore library
//!
//! Minimal semantic document store: documents are embedded once at ingestion,
//! persisted in SQLite, and ranked against queries by exact cosine similarity.
//!
//! # Modules
//!
//! - `core`: Document types, errors, configuration
//! - `search`: Embedder, document store, ranker and the retrieval service

pub mod core;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::Config;
pub use crate::core::document::{Document, DocumentId, Metadata, NewDocument, QueryResult};
pub use crate::core::error::{Error, Result};
pub use search::{
    DefaultService, DocumentStore, Embedder, EmbeddingModel, RetrievalService, SimilarityRanker,
    SqliteStore,
};
