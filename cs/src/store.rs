//! Core CorpusStore implementation
//!
//! One SQLite table holds every corpus document together with its embedding
//! (little-endian f32 BLOB) and its metadata (JSON map). Content and
//! embedding are always written together in a single upsert, never
//! independently.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a corpus document
pub type DocumentId = String;

/// Score difference below which two hits are considered tied
pub const SCORE_EPSILON: f64 = 1e-6;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id                TEXT PRIMARY KEY,
    doc_type          TEXT NOT NULL,
    content           TEXT NOT NULL,
    metadata          TEXT NOT NULL,
    embedding         BLOB NOT NULL,
    embedding_version TEXT NOT NULL,
    updated_at        INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(doc_type);
";

/// Corpus document category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Standard,
    Policy,
    Curriculum,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Policy => "policy",
            Self::Curriculum => "curriculum",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "standard" => Ok(Self::Standard),
            "policy" => Ok(Self::Policy),
            "curriculum" => Ok(Self::Curriculum),
            _ => Err(StoreError::InvalidDbValue(format!("unknown doc type: {value}"))),
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored corpus document with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    /// Stable identifier from the source corpus
    pub id: DocumentId,
    /// Document category
    pub doc_type: DocType,
    /// Canonical text content (rendered by the indexer)
    pub content: String,
    /// Metadata map (grade band, concept area, jurisdiction, ...)
    pub metadata: BTreeMap<String, String>,
    /// Embedding vector, fixed dimension per store
    pub embedding: Vec<f32>,
    /// Embedding model identifier used to produce the vector
    pub embedding_version: String,
    /// Last write timestamp (unix ms), set by the store on upsert
    pub updated_at: i64,
}

/// Filter narrowing the candidate set before ranking
#[derive(Debug, Clone, Default)]
pub struct DocFilter {
    /// Restrict to one document category
    pub doc_type: Option<DocType>,
    /// Metadata fields that must match exactly
    pub metadata: BTreeMap<String, String>,
}

impl DocFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn matches(&self, doc: &CorpusDocument) -> bool {
        if let Some(t) = self.doc_type {
            if doc.doc_type != t {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(k, v)| doc.metadata.get(k).map(|m| m == v).unwrap_or(false))
    }
}

/// A ranked search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: CorpusDocument,
    /// Cosine similarity against the query vector
    pub score: f64,
}

/// Store-level statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub document_count: u64,
    pub standards: u64,
    pub policies: u64,
    pub curricula: u64,
    pub embedding_versions: Vec<String>,
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors for corpus store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid database value: {0}")]
    InvalidDbValue(String),
}

/// SQLite-backed vector store for corpus documents
pub struct CorpusStore {
    conn: Connection,
    dim: usize,
}

impl CorpusStore {
    /// Open or create the store at the given path
    ///
    /// `dim` is the embedding dimension; every document and query vector
    /// must match it.
    pub fn open(path: impl AsRef<Path>, dim: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        log::debug!("opened corpus store at {} (dim {})", path.display(), dim);
        Ok(Self { conn, dim })
    }

    /// Open an in-memory store (tests and dry runs)
    pub fn open_in_memory(dim: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, dim })
    }

    /// Embedding dimension this store was opened with
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Insert or overwrite a document
    ///
    /// Idempotent: re-upserting the same id overwrites content, embedding
    /// and metadata together and bumps `updated_at`. Returns true when an
    /// existing row was updated.
    pub fn upsert(&self, doc: &CorpusDocument) -> Result<bool> {
        if doc.embedding.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: doc.embedding.len(),
            });
        }

        let existed: bool = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1",
                params![doc.id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        let metadata = serde_json::to_string(&doc.metadata)?;
        let embedding = encode_embedding(&doc.embedding);
        let now = chrono::Utc::now().timestamp_millis();

        self.conn.execute(
            "INSERT INTO documents (id, doc_type, content, metadata, embedding, embedding_version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                doc_type = excluded.doc_type,
                content = excluded.content,
                metadata = excluded.metadata,
                embedding = excluded.embedding,
                embedding_version = excluded.embedding_version,
                updated_at = excluded.updated_at",
            params![
                doc.id,
                doc.doc_type.as_str(),
                doc.content,
                metadata,
                embedding,
                doc.embedding_version,
                now
            ],
        )?;

        log::debug!("upserted document {} (update: {})", doc.id, existed);
        Ok(existed)
    }

    /// Fetch one document by id
    pub fn get(&self, id: &str) -> Result<Option<CorpusDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, doc_type, content, metadata, embedding, embedding_version, updated_at
                 FROM documents WHERE id = ?1",
                params![id],
                decode_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.into_document()?)),
            None => Ok(None),
        }
    }

    /// Rank documents by cosine similarity against a query vector
    ///
    /// Returns at most `k` hits sorted by descending score; scores within
    /// [`SCORE_EPSILON`] are tied and ordered by ascending document id.
    /// Relevance thresholding is the caller's concern.
    pub fn search(&self, query: &[f32], filter: &DocFilter, k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = match filter.doc_type {
            Some(_) => self.conn.prepare(
                "SELECT id, doc_type, content, metadata, embedding, embedding_version, updated_at
                 FROM documents WHERE doc_type = ?1",
            )?,
            None => self.conn.prepare(
                "SELECT id, doc_type, content, metadata, embedding, embedding_version, updated_at
                 FROM documents",
            )?,
        };

        let rows: Vec<RawRow> = match filter.doc_type {
            Some(t) => stmt
                .query_map(params![t.as_str()], decode_row)?
                .collect::<std::result::Result<_, _>>()?,
            None => stmt
                .query_map([], decode_row)?
                .collect::<std::result::Result<_, _>>()?,
        };

        let mut hits = Vec::new();
        for raw in rows {
            let document = raw.into_document()?;
            // A database written under another dimension would otherwise
            // zip to the shorter length and score garbage
            if document.embedding.len() != self.dim {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dim,
                    actual: document.embedding.len(),
                });
            }
            if !filter.matches(&document) {
                continue;
            }
            let score = cosine_similarity(query, &document.embedding);
            hits.push(SearchHit { document, score });
        }

        // Quantized score keeps the comparator a total order while giving
        // near-equal scores a deterministic id tie-break.
        hits.sort_by(|a, b| {
            let ka = (a.score / SCORE_EPSILON).round() as i64;
            let kb = (b.score / SCORE_EPSILON).round() as i64;
            kb.cmp(&ka).then_with(|| a.document.id.cmp(&b.document.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Delete every document of one category (corpus re-seed)
    pub fn delete_by_type(&self, doc_type: DocType) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM documents WHERE doc_type = ?1",
            params![doc_type.as_str()],
        )?;
        log::info!("deleted {} {} documents", deleted, doc_type);
        Ok(deleted)
    }

    /// Total number of stored documents
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Distinct embedding versions present in the store
    ///
    /// More than one entry means mixed embedding models, which silently
    /// breaks ranking; the retriever guards against it.
    pub fn embedding_versions(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT embedding_version FROM documents ORDER BY embedding_version")?;
        let versions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(versions)
    }

    /// Store-level statistics for the ops CLI
    pub fn stats(&self) -> Result<StoreStats> {
        let count_type = |t: DocType| -> Result<u64> {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE doc_type = ?1",
                params![t.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            document_count: self.count()?,
            standards: count_type(DocType::Standard)?,
            policies: count_type(DocType::Policy)?,
            curricula: count_type(DocType::Curriculum)?,
            embedding_versions: self.embedding_versions()?,
        })
    }

    /// List document ids, optionally restricted to one category
    pub fn list_ids(&self, doc_type: Option<DocType>) -> Result<Vec<DocumentId>> {
        let mut stmt = match doc_type {
            Some(_) => self
                .conn
                .prepare("SELECT id FROM documents WHERE doc_type = ?1 ORDER BY id")?,
            None => self.conn.prepare("SELECT id FROM documents ORDER BY id")?,
        };
        let ids = match doc_type {
            Some(t) => stmt
                .query_map(params![t.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?,
            None => stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?,
        };
        Ok(ids)
    }
}

struct RawRow {
    id: String,
    doc_type: String,
    content: String,
    metadata: String,
    embedding: Vec<u8>,
    embedding_version: String,
    updated_at: i64,
}

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        doc_type: row.get(1)?,
        content: row.get(2)?,
        metadata: row.get(3)?,
        embedding: row.get(4)?,
        embedding_version: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl RawRow {
    fn into_document(self) -> Result<CorpusDocument> {
        Ok(CorpusDocument {
            doc_type: DocType::parse(&self.doc_type)?,
            metadata: serde_json::from_str(&self.metadata)?,
            embedding: decode_embedding(&self.embedding)?,
            id: self.id,
            content: self.content,
            embedding_version: self.embedding_version,
            updated_at: self.updated_at,
        })
    }
}

/// Encode an embedding as a little-endian f32 blob
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian f32 blob back into an embedding
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::InvalidDbValue(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity between two vectors of equal length
///
/// Zero-norm vectors score 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, doc_type: DocType, embedding: Vec<f32>) -> CorpusDocument {
        CorpusDocument {
            id: id.to_string(),
            doc_type,
            content: format!("content of {id}"),
            metadata: BTreeMap::new(),
            embedding,
            embedding_version: "test-embedder-v1".to_string(),
            updated_at: 0,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = CorpusStore::open_in_memory(3).unwrap();
        let d = doc("std-1", DocType::Standard, vec![1.0, 0.0, 0.0]);

        assert!(!store.upsert(&d).unwrap());
        let first = store.get("std-1").unwrap().unwrap();

        // Second ingest of the identical record: one row, same embedding
        assert!(store.upsert(&d).unwrap());
        let second = store.get("std-1").unwrap().unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(first.embedding, second.embedding);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_upsert_overwrites_content_and_embedding_together() {
        let store = CorpusStore::open_in_memory(3).unwrap();
        store
            .upsert(&doc("std-1", DocType::Standard, vec![1.0, 0.0, 0.0]))
            .unwrap();

        let mut updated = doc("std-1", DocType::Standard, vec![0.0, 1.0, 0.0]);
        updated.content = "revised".to_string();
        store.upsert(&updated).unwrap();

        let stored = store.get("std-1").unwrap().unwrap();
        assert_eq!(stored.content, "revised");
        assert_eq!(stored.embedding, vec![0.0, 1.0, 0.0]);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_search_rejects_stored_rows_with_wrong_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.db");

        {
            let store = CorpusStore::open(&path, 2).unwrap();
            store
                .upsert(&doc("std-1", DocType::Standard, vec![1.0, 0.0]))
                .unwrap();
        }

        // Same database reopened under a different dimension
        let store = CorpusStore::open(&path, 3).unwrap();
        let err = store
            .search(&[1.0, 0.0, 0.0], &DocFilter::new(), 5)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_upsert_rejects_wrong_dimension() {
        let store = CorpusStore::open_in_memory(3).unwrap();
        let err = store
            .upsert(&doc("std-1", DocType::Standard, vec![1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_search_ranks_by_descending_similarity() {
        let store = CorpusStore::open_in_memory(2).unwrap();
        store
            .upsert(&doc("a", DocType::Standard, vec![1.0, 0.0]))
            .unwrap();
        store
            .upsert(&doc("b", DocType::Standard, vec![0.0, 1.0]))
            .unwrap();
        store
            .upsert(&doc("c", DocType::Standard, vec![0.7, 0.7]))
            .unwrap();

        let hits = store.search(&[1.0, 0.0], &DocFilter::new(), 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_search_ties_break_by_ascending_id() {
        let store = CorpusStore::open_in_memory(2).unwrap();
        // Identical vectors: identical scores
        store
            .upsert(&doc("zeta", DocType::Standard, vec![1.0, 1.0]))
            .unwrap();
        store
            .upsert(&doc("alpha", DocType::Standard, vec![1.0, 1.0]))
            .unwrap();

        let hits = store.search(&[1.0, 1.0], &DocFilter::new(), 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_search_respects_k() {
        let store = CorpusStore::open_in_memory(2).unwrap();
        for i in 0..5 {
            store
                .upsert(&doc(&format!("d{i}"), DocType::Policy, vec![1.0, 0.1 * i as f32]))
                .unwrap();
        }
        let hits = store.search(&[1.0, 0.0], &DocFilter::new(), 3).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_search_filters_by_type_and_metadata() {
        let store = CorpusStore::open_in_memory(2).unwrap();
        let mut a = doc("a", DocType::Standard, vec![1.0, 0.0]);
        a.metadata.insert("grade-band".to_string(), "6-8".to_string());
        let mut b = doc("b", DocType::Policy, vec![1.0, 0.0]);
        b.metadata.insert("grade-band".to_string(), "6-8".to_string());
        let mut c = doc("c", DocType::Standard, vec![1.0, 0.0]);
        c.metadata.insert("grade-band".to_string(), "9-10".to_string());
        store.upsert(&a).unwrap();
        store.upsert(&b).unwrap();
        store.upsert(&c).unwrap();

        let filter = DocFilter::new()
            .with_doc_type(DocType::Standard)
            .with_metadata("grade-band", "6-8");
        let hits = store.search(&[1.0, 0.0], &filter, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "a");
    }

    #[test]
    fn test_delete_by_type() {
        let store = CorpusStore::open_in_memory(2).unwrap();
        store
            .upsert(&doc("a", DocType::Standard, vec![1.0, 0.0]))
            .unwrap();
        store
            .upsert(&doc("b", DocType::Policy, vec![0.0, 1.0]))
            .unwrap();

        assert_eq!(store.delete_by_type(DocType::Standard).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get("a").unwrap().is_none());
        assert!(store.get("b").unwrap().is_some());
    }

    #[test]
    fn test_embedding_roundtrip() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)).unwrap(), v);
        assert!(decode_embedding(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        let s = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_embedding_versions_distinct() {
        let store = CorpusStore::open_in_memory(2).unwrap();
        let mut a = doc("a", DocType::Standard, vec![1.0, 0.0]);
        a.embedding_version = "v1".to_string();
        let mut b = doc("b", DocType::Standard, vec![0.0, 1.0]);
        b.embedding_version = "v2".to_string();
        store.upsert(&a).unwrap();
        store.upsert(&b).unwrap();

        assert_eq!(store.embedding_versions().unwrap(), vec!["v1", "v2"]);
    }
}
