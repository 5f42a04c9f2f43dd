//! Retriever: query embedding plus filtered similarity search

use std::sync::{Arc, Mutex};

use corpusstore::{CorpusStore, DocFilter, SearchHit};
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::error::PlanError;
use crate::index::lock;
use crate::llm::EmbeddingClient;

/// Read-only retrieval over the corpus store
///
/// Shares the embedding client (and therefore the version tag) with the
/// indexer; mixed embedding versions are refused rather than silently
/// producing broken rankings.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<Mutex<CorpusStore>>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<Mutex<CorpusStore>>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Embed a query with the same model the indexer used
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PlanError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| PlanError::Configuration("embedding provider returned no vector".to_string()))
    }

    /// Return the most relevant documents for a query
    ///
    /// At most `top-k` hits, descending similarity, ties by ascending id.
    /// Hits below `min-score` are dropped; an empty result is valid and
    /// callers proceed without retrieved context.
    pub async fn retrieve(&self, query: &str, filter: &DocFilter) -> Result<Vec<SearchHit>, PlanError> {
        self.guard_embedding_version()?;

        let vector = self.embed_query(query).await?;
        let hits = {
            let store = lock(&self.store);
            store
                .search(&vector, filter, self.config.top_k)
                .map_err(|e| PlanError::Configuration(e.to_string()))?
        };

        let before = hits.len();
        let hits: Vec<SearchHit> = hits.into_iter().filter(|h| h.score >= self.config.min_score).collect();
        if hits.len() < before {
            debug!(
                dropped = before - hits.len(),
                min_score = self.config.min_score,
                "dropped low-relevance hits"
            );
        }
        debug!(count = hits.len(), "retrieval complete");
        Ok(hits)
    }

    /// Refuse to rank against documents embedded with a different model
    fn guard_embedding_version(&self) -> Result<(), PlanError> {
        let versions = {
            let store = lock(&self.store);
            store
                .embedding_versions()
                .map_err(|e| PlanError::Configuration(e.to_string()))?
        };
        for version in &versions {
            if version != self.embedder.version() {
                warn!(stored = %version, query = %self.embedder.version(), "embedding version mismatch");
                return Err(PlanError::Configuration(format!(
                    "stored documents use embedding version '{}' but queries use '{}'; re-seed the corpus",
                    version,
                    self.embedder.version()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockEmbeddingClient;
    use corpusstore::{CorpusDocument, DocType};
    use std::collections::BTreeMap;

    fn store_with(docs: Vec<CorpusDocument>) -> Arc<Mutex<CorpusStore>> {
        let store = CorpusStore::open_in_memory(4).unwrap();
        for doc in &docs {
            store.upsert(doc).unwrap();
        }
        Arc::new(Mutex::new(store))
    }

    fn doc(id: &str, embedding: Vec<f32>, version: &str) -> CorpusDocument {
        CorpusDocument {
            id: id.to_string(),
            doc_type: DocType::Standard,
            content: format!("doc {id}"),
            metadata: BTreeMap::new(),
            embedding,
            embedding_version: version.to_string(),
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_version_mismatch_refused() {
        let store = store_with(vec![doc("a", vec![1.0, 0.0, 0.0, 0.0], "other-model")]);
        let retriever = Retriever::new(
            Arc::new(MockEmbeddingClient::new(4)),
            store,
            RetrievalConfig::default(),
        );

        let err = retriever.retrieve("query", &DocFilter::new()).await.unwrap_err();
        assert!(matches!(err, PlanError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty() {
        let store = store_with(vec![]);
        let retriever = Retriever::new(
            Arc::new(MockEmbeddingClient::new(4)),
            store,
            RetrievalConfig::default(),
        );

        let hits = retriever.retrieve("query", &DocFilter::new()).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_drops_low_relevance() {
        // mock embedder produces vectors with components in [0, 1); a doc
        // orthogonal-ish to everything scores near zero
        let store = store_with(vec![doc("far", vec![-1.0, 0.0, 0.0, 0.0], "mock-embedder-v1")]);
        let retriever = Retriever::new(
            Arc::new(MockEmbeddingClient::new(4)),
            store,
            RetrievalConfig {
                top_k: 5,
                min_score: 0.99,
            },
        );

        let hits = retriever.retrieve("anything", &DocFilter::new()).await.unwrap();
        assert!(hits.is_empty());
    }
}
