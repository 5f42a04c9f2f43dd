//! Framed streaming events for one generation exchange

use serde::{Deserialize, Serialize};

use crate::domain::SourceRef;

/// What the exchange produced, carried on the terminal event
///
/// Makes the refine-step distinction explicit: callers never infer
/// plan-vs-answer from content shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// A new plan version was produced
    PlanUpdate { version: u32 },
    /// A plain conversational answer, no plan change
    Answer,
}

/// One framed event within a single generation exchange
///
/// Events for one exchange arrive in production order; `Done` is terminal
/// and nothing follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text appended in order to the in-progress assistant message
    Content { delta: String },

    /// Replaces (never appends to) the message's current sources
    Sources { documents: Vec<SourceRef> },

    /// The in-progress message is invalid; if empty, discard it entirely
    Error { message: String },

    /// Terminal event for the exchange
    Done { outcome: GenerationOutcome },
}

impl StreamEvent {
    pub fn content(delta: impl Into<String>) -> Self {
        StreamEvent::Content { delta: delta.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
