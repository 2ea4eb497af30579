//! Retrieval service - composes an embedder, a document store and the ranker
//!
//! Stateless per request: ingest, query and list-all go straight through to
//! the collaborators. Construct one instance and share it (e.g. via `Arc`).

use std::time::Instant;

use tracing::{debug, info};

use super::embedding::{Embedder, EmbeddingModel};
use super::ranker::{top_k, SimilarityRanker};
use super::store::{DocumentStore, SqliteStore, StoreStats};
use crate::core::config::Config;
use crate::core::document::{Document, DocumentId, NewDocument, QueryResult};
use crate::core::error::{Error, Result};

/// Built-in model over the SQLite store
pub type DefaultService = RetrievalService<EmbeddingModel, SqliteStore>;

pub struct RetrievalService<E, S> {
    embedder: E,
    store: S,
    ranker: SimilarityRanker,
}

impl<E: Embedder, S: DocumentStore> RetrievalService<E, S> {
    /// Fails with `DimensionMismatch` when the embedder and the store disagree
    pub fn new(embedder: E, store: S) -> Result<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(Error::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimension(),
            });
        }

        let ranker = SimilarityRanker::new(store.dimension());
        Ok(Self {
            embedder,
            store,
            ranker,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embed and persist a batch of documents.
    ///
    /// The batch is all-or-nothing: every item is validated and embedded
    /// before the store is touched, then written in one transaction.
    pub fn ingest(&self, items: Vec<NewDocument>) -> Result<Vec<DocumentId>> {
        if items.is_empty() {
            return Err(Error::EmptyInput);
        }
        for item in &items {
            item.validate()?;
        }

        let start = Instant::now();
        let mut batch = Vec::with_capacity(items.len());
        for item in items {
            let vector = self.embed(&item.text)?;
            batch.push((item, vector));
        }

        let ids = self.store.append_batch(batch)?;
        info!(
            count = ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ingested documents"
        );
        Ok(ids)
    }

    /// Rank every stored document against `text`.
    ///
    /// An empty store yields an empty list.
    pub fn query(&self, text: &str) -> Result<Vec<QueryResult>> {
        if text.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let start = Instant::now();
        let query_vector = self.embed(text)?;
        let documents = self.store.all()?;
        let scanned = documents.len();
        let ranked = self.ranker.rank(&query_vector, documents)?;

        debug!(
            scanned,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ranked documents"
        );
        Ok(ranked.into_iter().map(QueryResult::from).collect())
    }

    /// [`query`](Self::query) truncated to the best `limit` results
    pub fn query_top(&self, text: &str, limit: usize) -> Result<Vec<QueryResult>> {
        Ok(top_k(self.query(text)?, limit))
    }

    /// Every document in insertion order, unranked
    pub fn list_all(&self) -> Result<Vec<Document>> {
        self.store.all()
    }

    pub fn get(&self, id: DocumentId) -> Result<Document> {
        self.store.get(id)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    /// Embedder errors always surface as `EmbeddingFailure`
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self.embedder.embed(text) {
            Ok(vector) => Ok(vector),
            Err(e @ Error::EmbeddingFailure(_)) => Err(e),
            Err(other) => Err(Error::EmbeddingFailure(other.to_string())),
        }
    }
}

impl RetrievalService<EmbeddingModel, SqliteStore> {
    /// Open the configured store with the built-in embedding model
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let embedder = EmbeddingModel::new();
        // Reject before the store file gets pinned to the wrong dimension
        if config.dimension != embedder.dimension() {
            return Err(Error::DimensionMismatch {
                expected: embedder.dimension(),
                actual: config.dimension,
            });
        }

        let store = SqliteStore::open(&config.db_path, config.dimension)?;
        Self::new(embedder, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Metadata;
    use crate::search::embedding::{EmbeddingModel, EMBEDDING_DIM};
    use crate::search::store::SqliteStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns preset vectors by text and counts calls
    struct FixedEmbedder {
        dim: usize,
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new(dim: usize, pairs: &[(&str, Vec<f32>)]) -> Self {
            Self {
                dim,
                vectors: pairs
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for FixedEmbedder {
        fn dimension(&self) -> usize {
            self.dim
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| Error::EmbeddingFailure(format!("no vector for {:?}", text)))
        }
    }

    /// Claims 384 dimensions but produces 10
    struct FaultyEmbedder;

    impl Embedder for FaultyEmbedder {
        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 10])
        }
    }

    /// Produces a NaN component
    struct NanEmbedder;

    impl Embedder for NanEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![f32::NAN, 1.0])
        }
    }

    /// Fails with a non-embedding error kind
    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::StorageFailure("model file unreadable".into()))
        }
    }

    fn abc_service() -> Result<RetrievalService<FixedEmbedder, SqliteStore>> {
        let embedder = FixedEmbedder::new(
            2,
            &[
                ("A", vec![1.0, 0.0]),
                ("B", vec![0.0, 1.0]),
                ("C", vec![1.0, 1.0]),
                ("query", vec![1.0, 0.0]),
            ],
        );
        RetrievalService::new(embedder, SqliteStore::open_in_memory(2)?)
    }

    fn items(texts: &[&str]) -> Vec<NewDocument> {
        texts
            .iter()
            .map(|t| NewDocument::with_filename(*t, format!("{}.txt", t.to_lowercase())))
            .collect()
    }

    #[test]
    fn test_ingest_then_list_round_trip() -> Result<()> {
        let service =
            RetrievalService::new(EmbeddingModel::new(), SqliteStore::open_in_memory(EMBEDDING_DIM)?)?;

        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), "a.txt".to_string());
        let ids = service.ingest(vec![NewDocument::new("A", metadata.clone())])?;

        let all = service.list_all()?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, ids[0]);
        assert_eq!(all[0].text, "A");
        assert_eq!(all[0].metadata, metadata);
        assert_eq!(all[0].vector.len(), EMBEDDING_DIM);
        Ok(())
    }

    #[test]
    fn test_query_scenario() -> Result<()> {
        let service = abc_service()?;
        service.ingest(items(&["A", "B", "C"]))?;

        let results = service.query("query")?;
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "C", "B"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 0.70710677).abs() < 1e-6);
        assert_eq!(results[2].score, 0.0);
        assert_eq!(results[0].filename(), Some("a.txt"));
        Ok(())
    }

    #[test]
    fn test_query_top_truncates_after_ranking() -> Result<()> {
        let service = abc_service()?;
        service.ingest(items(&["B", "C", "A"]))?;

        let results = service.query_top("query", 1)?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "A");
        Ok(())
    }

    #[test]
    fn test_identical_documents_tie_in_insertion_order() -> Result<()> {
        let service = abc_service()?;
        let ids = service.ingest(items(&["C", "C", "C"]))?;

        let results = service.query("query")?;
        let ranked_ids: Vec<DocumentId> = results.iter().map(|r| r.document_id).collect();
        assert_eq!(ranked_ids, ids);
        assert!(results.windows(2).all(|w| w[0].score == w[1].score));
        Ok(())
    }

    #[test]
    fn test_query_empty_store() -> Result<()> {
        let service = abc_service()?;
        assert!(service.query("query")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_input_and_query_rejected_before_embedding() -> Result<()> {
        let service = abc_service()?;

        assert!(matches!(service.ingest(Vec::new()), Err(Error::EmptyInput)));
        assert!(matches!(service.query(""), Err(Error::EmptyQuery)));
        assert!(matches!(service.query("  \n\t"), Err(Error::EmptyQuery)));
        assert_eq!(service.embedder().calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn test_missing_filename_rejected() -> Result<()> {
        let service = abc_service()?;
        let result = service.ingest(vec![NewDocument::new("A", Metadata::new())]);

        assert!(matches!(result, Err(Error::MissingMetadata(_))));
        assert_eq!(service.embedder().calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.store().len()?, 0);
        Ok(())
    }

    #[test]
    fn test_faulty_embedder_leaves_store_unchanged() -> Result<()> {
        let service = RetrievalService::new(FaultyEmbedder, SqliteStore::open_in_memory(EMBEDDING_DIM)?)?;

        let result = service.ingest(items(&["A"]));
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 384, actual: 10 })
        ));
        assert_eq!(service.list_all()?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_non_finite_embedding_leaves_store_unchanged() -> Result<()> {
        let service = RetrievalService::new(NanEmbedder, SqliteStore::open_in_memory(2)?)?;

        let result = service.ingest(items(&["A"]));
        assert!(matches!(result, Err(Error::NonFiniteVector { index: 0 })));
        assert_eq!(service.stats()?.document_count, 0);
        Ok(())
    }

    #[test]
    fn test_stats_follow_ingestion() -> Result<()> {
        let service = abc_service()?;
        assert_eq!(service.stats()?.document_count, 0);

        service.ingest(items(&["A", "B"]))?;
        let stats = service.stats()?;
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.dimension, 2);
        assert!(stats.last_ingested.is_some());
        Ok(())
    }

    #[test]
    fn test_embedding_failure_aborts_whole_batch() -> Result<()> {
        let service = abc_service()?;

        let result = service.ingest(items(&["A", "unknown", "B"]));
        assert!(matches!(result, Err(Error::EmbeddingFailure(_))));
        assert!(service.list_all()?.is_empty());

        assert!(matches!(service.query("unknown"), Err(Error::EmbeddingFailure(_))));
        Ok(())
    }

    #[test]
    fn test_embedder_errors_surface_as_embedding_failure() -> Result<()> {
        let service = RetrievalService::new(BrokenEmbedder, SqliteStore::open_in_memory(2)?)?;
        assert!(matches!(
            service.query("anything"),
            Err(Error::EmbeddingFailure(msg)) if msg.contains("model file unreadable")
        ));
        Ok(())
    }

    #[test]
    fn test_embedder_store_dimension_disagreement() -> Result<()> {
        let result = RetrievalService::new(EmbeddingModel::new(), SqliteStore::open_in_memory(2)?);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 2, actual: 384 })
        ));
        Ok(())
    }

    #[test]
    fn test_open_from_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config {
            db_path: dir.path().join("data/docs.db"),
            ..Config::default()
        };

        let service = DefaultService::open(&config)?;
        service.ingest(items(&["hello world"]))?;
        assert_eq!(DefaultService::open(&config)?.list_all()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_open_rejects_unsupported_dimension() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config {
            db_path: dir.path().join("docs.db"),
            dimension: 2,
            ..Config::default()
        };

        assert!(matches!(
            DefaultService::open(&config),
            Err(Error::DimensionMismatch { expected: 384, actual: 2 })
        ));
        assert!(!config.db_path.exists());
        Ok(())
    }

    #[test]
    fn test_get_unknown_document() -> Result<()> {
        let service = abc_service()?;
        assert!(matches!(service.get(DocumentId(1)), Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_duplicates_are_distinct_documents() -> Result<()> {
        let service = abc_service()?;
        let first = service.ingest(items(&["A"]))?;
        let second = service.ingest(items(&["A"]))?;

        assert_ne!(first, second);
        assert_eq!(service.list_all()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_restart_preserves_listing_and_ranking() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("docs.db");
        let texts = ["rust storage engines", "cooking with garlic", "sqlite in rust"];

        let (listed, ranked) = {
            let store = SqliteStore::open(&path, EMBEDDING_DIM)?;
            let service = RetrievalService::new(EmbeddingModel::new(), store)?;
            service.ingest(items(&texts))?;
            (service.list_all()?, service.query("rust sqlite")?)
        };

        let store = SqliteStore::open(&path, EMBEDDING_DIM)?;
        let service = RetrievalService::new(EmbeddingModel::new(), store)?;
        assert_eq!(service.list_all()?, listed);
        assert_eq!(service.query("rust sqlite")?, ranked);
        Ok(())
    }

    #[test]
    fn test_concurrent_ingestion() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SqliteStore::open(&dir.path().join("docs.db"), EMBEDDING_DIM)?;
        let service = Arc::new(RetrievalService::new(EmbeddingModel::new(), store)?);
        let n = 24;

        let ids = std::thread::scope(|s| {
            let handles: Vec<_> = (0..n)
                .map(|i| {
                    let service = Arc::clone(&service);
                    s.spawn(move || {
                        service.ingest(vec![NewDocument::with_filename(
                            format!("unique document number {}", i),
                            format!("{}.txt", i),
                        )])
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("ingest thread panicked"))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut ids: Vec<DocumentId> = ids.into_iter().flatten().collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), n);
        assert_eq!(service.list_all()?.len(), n);
        Ok(())
    }
}
