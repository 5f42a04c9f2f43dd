//! LlmClient and EmbeddingClient trait definitions

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChatChunk, ChatRequest, ChatResponse, LlmError};

/// Stateless generation client - each call is independent
///
/// Conversation state lives in the domain model, not in the client; every
/// call carries the full message history it needs.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Streaming completion
    ///
    /// Sends chunks to the provided channel as they arrive, in production
    /// order. Returns the final accumulated response.
    async fn stream(
        &self,
        request: ChatRequest,
        chunk_tx: mpsc::Sender<ChatChunk>,
    ) -> Result<ChatResponse, LlmError>;
}

/// Text embedding client
///
/// The indexer and the retriever must share one implementation (or at least
/// one `version()`); mixing embedding models silently breaks ranking.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embedding model identifier, stored alongside every document
    fn version(&self) -> &str;

    /// Dimension of produced vectors
    fn dim(&self) -> usize;

    /// Embed a batch of texts in one bulk request
    ///
    /// The returned vectors are in input order regardless of the order the
    /// provider answered in.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock generation client for unit tests
    pub struct MockLlmClient {
        responses: Vec<ChatResponse>,
        call_count: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses
                .get(idx.min(self.responses.len().saturating_sub(1)))
                .cloned()
                .ok_or_else(|| LlmError::InvalidResponse("mock has no responses".to_string()))
        }

        async fn stream(
            &self,
            request: ChatRequest,
            chunk_tx: mpsc::Sender<ChatChunk>,
        ) -> Result<ChatResponse, LlmError> {
            let response = self.complete(request).await?;
            for word in response.content.split_inclusive(' ') {
                let _ = chunk_tx.send(ChatChunk::TextDelta(word.to_string())).await;
            }
            let _ = chunk_tx
                .send(ChatChunk::Done {
                    finish_reason: response.finish_reason,
                })
                .await;
            Ok(response)
        }
    }

    /// Deterministic embedding client for unit tests
    pub struct MockEmbeddingClient {
        dim: usize,
    }

    impl MockEmbeddingClient {
        pub fn new(dim: usize) -> Self {
            Self { dim }
        }
    }

    #[async_trait]
    impl EmbeddingClient for MockEmbeddingClient {
        fn version(&self) -> &str {
            "mock-embedder-v1"
        }

        fn dim(&self) -> usize {
            self.dim
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            // Hash-derived but deterministic: identical text, identical vector
            Ok(texts
                .iter()
                .map(|t| {
                    (0..self.dim)
                        .map(|i| {
                            let h = t
                                .bytes()
                                .fold(i as u32 + 1, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
                            (h % 1000) as f32 / 1000.0
                        })
                        .collect()
                })
                .collect())
        }
    }
}
