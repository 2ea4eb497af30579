use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Metadata key every document must carry
pub const FILENAME_KEY: &str = "filename";

/// String-to-string metadata attached to a document
pub type Metadata = BTreeMap<String, String>;

/// Opaque document identifier assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored document. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub metadata: Metadata,
    #[serde(skip)]
    pub vector: Vec<f32>,
    pub created_at: i64,
}

impl Document {
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get(FILENAME_KEY).map(String::as_str)
    }
}

/// Text and metadata submitted for ingestion
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewDocument {
    pub text: String,
    pub metadata: Metadata,
}

impl NewDocument {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Shorthand for a document whose only metadata is its filename
    pub fn with_filename(text: impl Into<String>, filename: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(FILENAME_KEY.to_string(), filename.into());
        Self::new(text, metadata)
    }

    pub fn validate(&self) -> Result<()> {
        match self.metadata.get(FILENAME_KEY) {
            Some(name) if !name.trim().is_empty() => Ok(()),
            _ => Err(Error::MissingMetadata(FILENAME_KEY.to_string())),
        }
    }
}

/// One ranked hit, recomputed per query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub document_id: DocumentId,
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
}

impl From<(Document, f32)> for QueryResult {
    fn from((doc, score): (Document, f32)) -> Self {
        Self {
            document_id: doc.id,
            score,
            text: doc.text,
            metadata: doc.metadata,
        }
    }
}

impl QueryResult {
    pub fn filename(&self) -> Option<&str> {
        self.metadata.get(FILENAME_KEY).map(String::as_str)
    }
}
