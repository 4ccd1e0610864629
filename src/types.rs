//! Core domain types shared by the gateway, index and orchestrators.

use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user.
    User,
    /// Model reply.
    Assistant,
    /// Instructions or injected context.
    System,
}

impl Role {
    /// Wire name used by OpenAI-compatible APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One message of a conversation, in chronological order within its slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who wrote the turn.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl ConversationTurn {
    /// Create a turn with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Caller-supplied fields of a knowledge item that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeDraft {
    /// Display title.
    pub title: String,
    /// Body text. This is what gets embedded.
    pub text: String,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Where the text came from.
    #[serde(default)]
    pub source: Option<String>,
}

/// A titled, tagged text record stored for semantic retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Identifier assigned by the composition service before the index write.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Body text.
    pub text: String,
    /// Free-form labels, each at most once, in first-seen order.
    pub tags: Vec<String>,
    /// Where the text came from.
    pub source: Option<String>,
    /// Creation time as written to the index.
    pub created_at: DateTime<Utc>,
}

/// Embedding produced by the upstream embedding model.
pub type EmbeddingVector = Vec<f32>;

/// A point crossing the vector index boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorIndexRecord {
    /// Point identifier.
    pub id: String,
    /// Primitive-valued payload.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Embedding.
    pub vector: EmbeddingVector,
}

/// Lazy, single-pass stream of completion tokens.
///
/// Dropping the stream releases the upstream connection.
pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Lazy, single-pass stream of raw audio bytes.
///
/// Dropping the stream releases the upstream connection.
pub type ByteChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ConversationTurn::assistant("hey")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hey"}"#);
    }

    #[test]
    fn draft_defaults_optional_fields() {
        let draft: KnowledgeDraft =
            serde_json::from_str(r#"{"title":"T","text":"body"}"#).unwrap();
        assert!(draft.tags.is_empty());
        assert!(draft.source.is_none());
    }
}
