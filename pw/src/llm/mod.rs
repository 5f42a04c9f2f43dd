//! Provider clients for generation and embeddings
//!
//! One generation trait, one embedding trait, one OpenAI-compatible
//! implementation of each. Construction goes through config so binaries
//! fail fast on missing credentials.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod types;

pub use client::{EmbeddingClient, LlmClient};
pub use error::LlmError;
pub use openai::{OpenAiClient, OpenAiEmbeddings};
pub use types::{ChatChunk, ChatMessage, ChatRequest, ChatResponse, FinishReason, Role};

use crate::config::{EmbeddingConfig, LlmConfig};

/// Create a generation client based on the provider specified in config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_llm_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{}'. Supported: openai",
            other
        ))),
    }
}

/// Create an embedding client based on the provider specified in config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_embedding_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbeddings::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown embedding provider: '{}'. Supported: openai",
            other
        ))),
    }
}
