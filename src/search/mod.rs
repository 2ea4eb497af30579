//! Retrieval core
//!
//! - `embedding`: text → vector capability and the built-in HTP model
//! - `store`: append-only SQLite document store
//! - `ranker`: exact cosine-similarity ranking
//! - `engine`: the retrieval service tying them together

pub mod embedding;
pub mod engine;
pub mod ranker;
pub mod store;

pub use embedding::{Embedder, EmbeddingModel};
pub use engine::{DefaultService, RetrievalService};
pub use ranker::{cosine_similarity, top_k, SimilarityRanker};
pub use store::{DocumentStore, SqliteStore, StoreStats};
