//! Document store backed by SQLite
//!
//! Text and metadata live in `documents`, vectors as little-endian f32 BLOBs
//! in `embeddings`. Similarity is computed in Rust by the ranker; SQLite only
//! provides durable, transactional, insertion-ordered storage.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::core::document::{Document, DocumentId, Metadata, NewDocument};
use crate::core::error::{Error, Result};

const SCHEMA_VERSION: &str = "1";
const META_DIMENSION: &str = "dimension";
const META_SCHEMA_VERSION: &str = "schema_version";

/// Append-only document collection
///
/// Implementations must make each append atomic and linearizable: a document
/// is either fully visible to a later [`all`](DocumentStore::all) or not at all.
pub trait DocumentStore: Send + Sync {
    /// Vector dimension fixed for the lifetime of the store
    fn dimension(&self) -> usize;

    /// Persist a batch of documents with their vectors, all or nothing.
    /// Ids are returned in batch order.
    fn append_batch(&self, batch: Vec<(NewDocument, Vec<f32>)>) -> Result<Vec<DocumentId>>;

    /// Every document in insertion order
    fn all(&self) -> Result<Vec<Document>>;

    fn get(&self, id: DocumentId) -> Result<Document>;

    fn len(&self) -> Result<usize>;

    fn stats(&self) -> Result<StoreStats>;

    fn append(&self, document: NewDocument, vector: Vec<f32>) -> Result<DocumentId> {
        let ids = self.append_batch(vec![(document, vector)])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| Error::StorageFailure("append produced no id".into()))
    }

}

/// Store statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub document_count: usize,
    pub dimension: usize,
    pub last_ingested: Option<i64>,
}

/// SQLite-backed [`DocumentStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteStore {
    /// Open or create a store at `db_path` pinned to `dimension`.
    ///
    /// Fails with `DimensionMismatch` when the file was created with a
    /// different dimension.
    pub fn open(db_path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self::init(conn, dimension)?;
        info!(path = %db_path.display(), dim = dimension, "opened document store");
        Ok(store)
    }

    /// Open in-memory store (for testing)
    pub fn open_in_memory(dimension: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, dimension)
    }

    fn init(mut conn: Connection, dimension: usize) -> Result<Self> {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,  -- JSON object
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                document_id INTEGER PRIMARY KEY,
                dim INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            );

            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![META_DIMENSION, dimension.to_string()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![META_SCHEMA_VERSION, SCHEMA_VERSION],
        )?;
        let stored: String = tx.query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            params![META_DIMENSION],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let stored: usize = stored
            .parse()
            .map_err(|_| Error::StorageFailure(format!("invalid stored dimension: {}", stored)))?;
        if stored != dimension {
            return Err(Error::DimensionMismatch {
                expected: stored,
                actual: dimension,
            });
        }

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StorageFailure("connection lock poisoned".into()))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Length and finiteness, checked before anything is written
    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFiniteVector { index });
        }
        Ok(())
    }

    fn decode(&self, row: RawRow) -> Result<Document> {
        let metadata: Metadata = serde_json::from_str(&row.metadata)?;
        let vector = blob_to_embedding(&row.embedding)?;
        self.check_dimension(&vector)?;

        Ok(Document {
            id: DocumentId(row.id),
            text: row.text,
            metadata,
            vector,
            created_at: row.created_at,
        })
    }
}

/// Columns as read from SQLite, before JSON and BLOB decoding
struct RawRow {
    id: i64,
    text: String,
    metadata: String,
    created_at: i64,
    embedding: Vec<u8>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            metadata: row.get(2)?,
            created_at: row.get(3)?,
            embedding: row.get(4)?,
        })
    }
}

const SELECT_DOCUMENTS: &str = r#"
    SELECT d.id, d.text, d.metadata, d.created_at, e.embedding
    FROM documents d
    JOIN embeddings e ON e.document_id = d.id
"#;

impl DocumentStore for SqliteStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn append_batch(&self, batch: Vec<(NewDocument, Vec<f32>)>) -> Result<Vec<DocumentId>> {
        // Validate everything before touching the database
        for (_, vector) in &batch {
            self.check_vector(vector)?;
        }

        let mut encoded = Vec::with_capacity(batch.len());
        for (doc, vector) in &batch {
            encoded.push((serde_json::to_string(&doc.metadata)?, embedding_to_blob(vector)));
        }

        let now = chrono::Utc::now().timestamp();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(batch.len());

        for ((doc, _), (metadata_json, blob)) in batch.iter().zip(&encoded) {
            tx.execute(
                "INSERT INTO documents (text, metadata, created_at) VALUES (?1, ?2, ?3)",
                params![doc.text, metadata_json, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO embeddings (document_id, dim, embedding) VALUES (?1, ?2, ?3)",
                params![id, self.dimension as i64, blob],
            )?;
            ids.push(DocumentId(id));
        }

        tx.commit()?;
        debug!(count = ids.len(), "appended documents");
        Ok(ids)
    }

    fn all(&self) -> Result<Vec<Document>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!("{} ORDER BY d.id", SELECT_DOCUMENTS))?;
            let rows = stmt.query_map([], RawRow::from_row)?;
            let raw = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            raw
        };

        raw.into_iter().map(|row| self.decode(row)).collect()
    }

    fn get(&self, id: DocumentId) -> Result<Document> {
        let raw = {
            let conn = self.lock()?;
            let sql = format!("{} WHERE d.id = ?1", SELECT_DOCUMENTS);
            let row = conn.query_row(&sql, params![id.0], RawRow::from_row).optional()?;
            row
        };

        match raw {
            Some(row) => self.decode(row),
            None => Err(Error::NotFound(id)),
        }
    }

    fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let (count, last): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(created_at) FROM documents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            document_count: count as usize,
            dimension: self.dimension,
            last_ingested: last,
        })
    }
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::StorageFailure(format!(
            "corrupt embedding blob of {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
