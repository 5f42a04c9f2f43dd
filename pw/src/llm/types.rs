//! Provider request/response types
//!
//! Modeled on OpenAI-compatible chat and embeddings APIs but generic enough
//! that another provider could sit behind the same traits.

use serde::{Deserialize, Serialize};

/// A chat completion request - everything needed for one generation call
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System prompt (rendered from a Handlebars template)
    pub system_prompt: String,

    /// Conversation history plus the new user message
    pub messages: Vec<ChatMessage>,

    /// Max tokens for the response
    pub max_tokens: u32,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Full generated text
    pub content: String,

    /// Why the model stopped
    pub finish_reason: FinishReason,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Other,
}

impl FinishReason {
    /// Parse from an OpenAI-compatible finish_reason string
    pub fn parse(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            _ => FinishReason::Other,
        }
    }
}

/// Streaming chunk forwarded on the channel during generation
#[derive(Debug, Clone)]
pub enum ChatChunk {
    /// A piece of generated text, in production order
    TextDelta(String),

    /// Generation complete
    Done { finish_reason: FinishReason },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ctors() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");

        let msg = ChatMessage::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);

        let msg = ChatMessage::system("You are helpful");
        assert_eq!(msg.role, Role::System);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
    }

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("length"), FinishReason::Length);
        assert_eq!(FinishReason::parse("content_filter"), FinishReason::Other);
    }
}
