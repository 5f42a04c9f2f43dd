//! Conversation and message entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::Role;

/// A cited corpus document attached to an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Corpus document id
    pub document_id: String,
    /// Display title
    pub title: String,
    /// Document category ("standard", "policy", "curriculum")
    pub doc_type: String,
    /// Optional link for display
    pub url: Option<String>,
}

/// A frozen message in a conversation
///
/// In-flight generation output lives outside the conversation; a message
/// is only appended once its content is final, so an aborted generation
/// never leaves a partial message behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Cited sources; a later sources event replaces the whole list
    pub sources: Option<Vec<SourceRef>>,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Replace (never merge) the sources list
    pub fn set_sources(&mut self, sources: Vec<SourceRef>) {
        self.sources = Some(sources);
    }
}

/// Ordered, append-only message sequence tied to one district profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Assigned lazily on first message
    pub id: Option<String>,
    pub profile_id: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            id: None,
            profile_id: profile_id.into(),
            messages: Vec::new(),
        }
    }

    /// Append a message, assigning the conversation id if this is the first
    ///
    /// Timestamps are forced non-decreasing so the sequence stays strictly
    /// time-ordered even under clock jitter.
    pub fn append(&mut self, mut message: Message) {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
        if let Some(last) = self.messages.last() {
            if message.created_at < last.created_at {
                message.created_at = last.created_at;
            }
        }
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_assigned_lazily() {
        let mut conv = Conversation::new("profile-1");
        assert!(conv.id.is_none());

        conv.append(Message::user("hello"));
        assert!(conv.id.is_some());

        let id = conv.id.clone();
        conv.append(Message::assistant("hi"));
        assert_eq!(conv.id, id);
    }

    #[test]
    fn test_messages_time_ordered() {
        let mut conv = Conversation::new("profile-1");
        let mut early = Message::user("first");
        early.created_at = 1000;
        conv.append(early);

        let mut late = Message::assistant("second");
        late.created_at = 500; // clock went backwards
        conv.append(late);

        assert!(conv.messages[1].created_at >= conv.messages[0].created_at);
    }

    #[test]
    fn test_set_sources_replaces() {
        let mut msg = Message::assistant("answer");
        msg.set_sources(vec![SourceRef {
            document_id: "a".to_string(),
            title: "A".to_string(),
            doc_type: "standard".to_string(),
            url: None,
        }]);
        msg.set_sources(vec![SourceRef {
            document_id: "b".to_string(),
            title: "B".to_string(),
            doc_type: "policy".to_string(),
            url: None,
        }]);

        let sources = msg.sources.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].document_id, "b");
    }
}
