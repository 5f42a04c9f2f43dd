//! OpenAI-compatible API clients
//!
//! Implements the LlmClient trait against a chat-completions endpoint with
//! SSE streaming, and the EmbeddingClient trait against a bulk embeddings
//! endpoint. Any provider speaking the same wire format works via
//! `base-url` in config.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ChatChunk, ChatRequest, ChatResponse, EmbeddingClient, FinishReason, LlmClient, LlmError, Role};
use crate::config::{EmbeddingConfig, LlmConfig};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Chat completions client
pub struct OpenAiClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config and
    /// fails fast when it is unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.get_api_key()?;
        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": request.system_prompt,
            }));
        }
        for msg in &request.messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": msg.content,
            }));
        }

        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "messages": messages,
            "stream": stream,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        debug!(model = %self.model, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request, false);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "complete: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(url.clone())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "complete: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);

                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "complete: retryable error");
                last_error = Some(LlmError::ApiError { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError { status, message: text });
            }

            let api_response: ChatCompletionResponse = response.json().await?;
            let choice = api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

            return Ok(ChatResponse {
                content: choice.message.map(|m| m.content).unwrap_or_default(),
                finish_reason: FinishReason::parse(choice.finish_reason.as_deref().unwrap_or("stop")),
            });
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }

    async fn stream(
        &self,
        request: ChatRequest,
        chunk_tx: mpsc::Sender<ChatChunk>,
    ) -> Result<ChatResponse, LlmError> {
        debug!(model = %self.model, "stream: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request, true);

        let mut last_error = None;
        let mut es = None;

        // Retry loop for establishing the connection
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "stream: retrying connection after error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let http_request = self.http.post(url.clone()).bearer_auth(&self.api_key).json(&body);

            match EventSource::new(http_request) {
                Ok(event_source) => {
                    es = Some(event_source);
                    break;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "stream: EventSource creation failed");
                    last_error = Some(LlmError::InvalidResponse(e.to_string()));
                    continue;
                }
            }
        }

        let mut es = es.ok_or_else(|| {
            last_error.unwrap_or_else(|| LlmError::InvalidResponse("Failed to create EventSource".to_string()))
        })?;

        let mut full_content = String::new();
        let mut finish_reason = FinishReason::Stop;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }

                    let data: serde_json::Value = serde_json::from_str(&msg.data).map_err(LlmError::Json)?;
                    if let Some(choice) = data["choices"].get(0) {
                        if let Some(text) = choice["delta"]["content"].as_str() {
                            full_content.push_str(text);
                            let _ = chunk_tx.send(ChatChunk::TextDelta(text.to_string())).await;
                        }
                        if let Some(reason) = choice["finish_reason"].as_str() {
                            finish_reason = FinishReason::parse(reason);
                        }
                    }
                }
                Ok(Event::Open) => {
                    debug!("stream: connection open");
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "stream: event error");
                    return Err(LlmError::InvalidResponse(e.to_string()));
                }
            }
        }

        debug!(content_len = full_content.len(), "stream: complete");
        let _ = chunk_tx.send(ChatChunk::Done { finish_reason }).await;

        Ok(ChatResponse {
            content: full_content,
            finish_reason,
        })
    }
}

/// Bulk embeddings client
pub struct OpenAiEmbeddings {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    dim: usize,
}

impl OpenAiEmbeddings {
    /// Create a new embeddings client from configuration
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, LlmError> {
        let api_key = config.get_api_key()?;
        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            dim: config.dim,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn version(&self) -> &str {
        &self.model
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        debug!(model = %self.model, count = texts.len(), "embed: called");
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let api_response: EmbeddingsResponse = response.json().await?;
        if api_response.data.len() != texts.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                api_response.data.len()
            )));
        }

        // Provider response order is not guaranteed to match request order;
        // each item carries its original index, so re-sort by it.
        let mut data = api_response.data;
        data.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.dim {
                return Err(LlmError::InvalidResponse(format!(
                    "embedding dimension {} does not match configured {}",
                    item.embedding.len(),
                    self.dim
                )));
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}

// OpenAI-compatible API response types

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn test_client() -> OpenAiClient {
        OpenAiClient {
            model: "gpt-4o".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.openai.com".to_string(),
            http: Client::new(),
            max_tokens: 4096,
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let client = test_client();
        let request = ChatRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![ChatMessage::user("Hello")],
            max_tokens: 1000,
        };

        let body = client.build_request_body(&request, false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are helpful");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_build_request_body_empty_system_prompt() {
        let client = test_client();
        let request = ChatRequest {
            system_prompt: String::new(),
            messages: vec![ChatMessage::user("Hello")],
            max_tokens: 1000,
        };

        let body = client.build_request_body(&request, true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_max_tokens_capped() {
        let client = test_client();
        let request = ChatRequest {
            system_prompt: "Test".to_string(),
            messages: vec![],
            max_tokens: 50_000,
        };

        let body = client.build_request_body(&request, false);
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn test_embeddings_response_resort() {
        // Out-of-order provider response is re-sorted by index
        let json = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ]}"#;
        let mut response: EmbeddingsResponse = serde_json::from_str(json).unwrap();
        response.data.sort_by_key(|item| item.index);
        assert_eq!(response.data[0].embedding, vec![1.0, 0.0]);
        assert_eq!(response.data[1].embedding, vec![0.0, 1.0]);
    }
}
