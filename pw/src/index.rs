//! Document indexer: corpus records in, embedded documents out
//!
//! Offline batch job. Renders each record into deterministic canonical
//! text (same input, byte-identical text, identical embedding), embeds in
//! bounded batches with fixed pacing between them, and upserts into the
//! corpus store. Safe to re-run: upserts are idempotent.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corpusstore::{CorpusDocument, CorpusStore, DocType, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::IndexingConfig;
use crate::llm::{EmbeddingClient, LlmError};

/// Retries per batch for retryable provider failures
const MAX_BATCH_RETRIES: u32 = 2;

/// A raw corpus record as it appears in a seed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusRecord {
    /// Stable id from the source corpus
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Indexing job outcome
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Documents written
    pub documents: usize,
    /// Of those, how many overwrote an existing row
    pub updated: usize,
    /// Batches committed
    pub batches: usize,
}

/// Errors aborting an indexing run
///
/// A failure aborts the *current* batch only; previously committed batches
/// remain valid, and `committed` says how many.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding batch {batch} failed ({committed} batches committed): {source}")]
    Provider {
        batch: usize,
        committed: usize,
        #[source]
        source: LlmError,
    },

    #[error("committing batch {batch} failed ({committed} batches committed): {source}")]
    Store {
        batch: usize,
        committed: usize,
        #[source]
        source: StoreError,
    },

    #[error("embedder dimension {provider} does not match store dimension {store}")]
    DimensionMismatch { provider: usize, store: usize },
}

impl IndexError {
    /// Provider/network failures are retryable; credential and schema
    /// mismatches are fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexError::Provider { source, .. } => source.is_retryable(),
            IndexError::Store { .. } => false,
            IndexError::DimensionMismatch { .. } => false,
        }
    }
}

/// Batch indexer over an embedding client and the corpus store
pub struct Indexer {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<Mutex<CorpusStore>>,
    config: IndexingConfig,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<Mutex<CorpusStore>>, config: IndexingConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Render a record into canonical embedding text
    ///
    /// Deterministic: metadata iterates in key order, so identical input
    /// always yields byte-identical text.
    pub fn canonical_text(record: &CorpusRecord) -> String {
        let mut text = format!("{}\n\n{}", record.title.trim(), record.body.trim());
        for (key, value) in &record.metadata {
            text.push_str(&format!("\n{}: {}", key, value));
        }
        text
    }

    /// Truncate text to the configured maximum, on a char boundary
    fn bounded_text(&self, text: String) -> String {
        if text.chars().count() <= self.config.max_input_chars {
            return text;
        }
        warn!(limit = self.config.max_input_chars, "truncating over-long text before embedding");
        text.chars().take(self.config.max_input_chars).collect()
    }

    /// Ingest records in bounded batches
    ///
    /// Runs to completion or returns the first error, leaving prior
    /// batches committed.
    pub async fn ingest_batch(&self, records: &[CorpusRecord]) -> Result<IngestReport, IndexError> {
        {
            let store = lock(&self.store);
            if self.embedder.dim() != store.dim() {
                return Err(IndexError::DimensionMismatch {
                    provider: self.embedder.dim(),
                    store: store.dim(),
                });
            }
        }

        let mut report = IngestReport::default();

        for (batch_idx, batch) in records.chunks(self.config.batch_size.max(1)).enumerate() {
            if batch_idx > 0 && self.config.pacing_ms > 0 {
                // Fixed pacing between batches for provider rate limits
                sleep(Duration::from_millis(self.config.pacing_ms)).await;
            }

            let texts: Vec<String> = batch
                .iter()
                .map(|r| self.bounded_text(Self::canonical_text(r)))
                .collect();

            let vectors = self.embed_with_retry(&texts, batch_idx, report.batches).await?;

            {
                let store = lock(&self.store);
                for (i, (record, embedding)) in batch.iter().zip(vectors).enumerate() {
                    let doc = CorpusDocument {
                        id: record.id.clone(),
                        doc_type: record.doc_type,
                        content: texts[i].clone(),
                        metadata: record.metadata.clone(),
                        embedding,
                        embedding_version: self.embedder.version().to_string(),
                        updated_at: 0,
                    };
                    let was_update = store.upsert(&doc).map_err(|source| IndexError::Store {
                        batch: batch_idx,
                        committed: report.batches,
                        source,
                    })?;
                    report.documents += 1;
                    if was_update {
                        report.updated += 1;
                    }
                }
            }

            report.batches += 1;
            debug!(batch = batch_idx, size = batch.len(), "batch committed");
        }

        info!(
            documents = report.documents,
            updated = report.updated,
            batches = report.batches,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn embed_with_retry(
        &self,
        texts: &[String],
        batch: usize,
        committed: usize,
    ) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut last_error = None;
        for attempt in 0..=MAX_BATCH_RETRIES {
            if attempt > 0 {
                warn!(batch, attempt, "retrying embedding batch after transient error");
                sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            match self.embedder.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() && attempt < MAX_BATCH_RETRIES => {
                    last_error = Some(e);
                }
                Err(e) => {
                    return Err(IndexError::Provider {
                        batch,
                        committed,
                        source: e,
                    });
                }
            }
        }
        Err(IndexError::Provider {
            batch,
            committed,
            source: last_error.unwrap_or_else(|| LlmError::InvalidResponse("retries exhausted".to_string())),
        })
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
