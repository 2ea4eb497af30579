//! Exact cosine-similarity ranking
//!
//! Linear scan over every document: O(N·D) per query, no approximate index.

use crate::core::document::Document;
use crate::core::error::{Error, Result};

/// Cosine similarity between two equal-length vectors.
///
/// Accumulates in f64 and clamps to [-1, 1]. A zero-norm operand, or a
/// non-finite result, scores exactly 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a * norm_b).sqrt();
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

/// Scores documents against a query vector of the store's dimension
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker {
    dimension: usize,
}

impl SimilarityRanker {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Rank every document by descending score.
    ///
    /// Equal scores keep the order of `documents`, which the store yields in
    /// insertion order. The full set is returned; see [`top_k`].
    pub fn rank(&self, query: &[f32], documents: Vec<Document>) -> Result<Vec<(Document, f32)>> {
        self.check(query.len())?;

        let mut ranked = Vec::with_capacity(documents.len());
        for doc in documents {
            self.check(doc.vector.len())?;
            let score = cosine_similarity(query, &doc.vector);
            ranked.push((doc, score));
        }

        // sort_by is stable
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked)
    }

    fn check(&self, actual: usize) -> Result<()> {
        if actual != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }
}

/// Keep the first `k` ranked entries
pub fn top_k<T>(mut ranked: Vec<T>, k: usize) -> Vec<T> {
    ranked.truncate(k);
    ranked
}
