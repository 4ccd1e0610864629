//! Knowledge composition: embedding plus index writes and reads.
//!
//! The service owns the mapping between knowledge item fields and the index
//! payload. Every operation opens its own index client through
//! [`VectorIndexClient::scoped`], so the connection is released even when the
//! index call fails.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::VectorConfig;
use crate::error::Result;
use crate::index::{VectorIndexClient, encode_item};
use crate::provider::Embedder;
use crate::types::{ConversationTurn, KnowledgeDraft, KnowledgeItem};

/// Tag attached to items derived from conversations.
pub const MEMORY_TAG: &str = "memory";

/// Source attached to items derived from conversations.
pub const MEMORY_SOURCE: &str = "chat";

/// Writes and searches knowledge items.
#[derive(Clone)]
pub struct KnowledgeService {
    embedder: Arc<dyn Embedder>,
    vector: VectorConfig,
}

impl std::fmt::Debug for KnowledgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeService")
            .field("vector", &self.vector)
            .finish_non_exhaustive()
    }
}

impl KnowledgeService {
    pub fn new(embedder: Arc<dyn Embedder>, vector: VectorConfig) -> Self {
        Self { embedder, vector }
    }

    /// Embed and store a new item.
    ///
    /// The id is generated here, before the index is touched. Repeated tags
    /// are stored once. The collection
    /// is sized from the embedding just produced. The returned item carries
    /// the timestamp that was written.
    pub async fn create_item(&self, draft: KnowledgeDraft) -> Result<KnowledgeItem> {
        let vector = self.embedder.embed(&draft.text).await?;
        let item = KnowledgeItem {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            text: draft.text,
            tags: unique_tags(draft.tags),
            source: draft.source,
            // Stored timestamps carry microseconds.
            created_at: Utc::now().trunc_subsecs(6),
        };

        let collection = self.vector.collection.clone();
        let record = encode_item(&item, vector);
        VectorIndexClient::scoped(&self.vector, move |client| {
            Box::pin(async move {
                client
                    .ensure_collection(&collection, record.vector.len())
                    .await?;
                client.upsert(&collection, std::slice::from_ref(&record)).await
            })
        })
        .await?;

        info!(id = %item.id, title = %item.title, "knowledge item stored");
        Ok(item)
    }

    /// Semantic search over stored items, most similar first.
    ///
    /// `limit` falls back to the configured search limit. No hits is an empty
    /// result, not an error.
    pub async fn search_items(&self, query: &str, limit: Option<usize>) -> Result<Vec<KnowledgeItem>> {
        let limit = limit.unwrap_or(self.vector.search_limit);
        let vector = self.embedder.embed(query).await?;
        let collection = self.vector.collection.clone();

        let items = VectorIndexClient::scoped(&self.vector, move |client| {
            Box::pin(async move { client.search(&collection, &vector, limit).await })
        })
        .await?;

        debug!(hits = items.len(), limit, "knowledge search finished");
        Ok(items)
    }

    /// Store a conversation as a memory item.
    ///
    /// Turn contents are joined with newlines in their given order.
    pub async fn remember_conversation(
        &self,
        turns: &[ConversationTurn],
        conversation_id: &str,
    ) -> Result<KnowledgeItem> {
        let draft = memory_draft(turns, conversation_id);
        self.create_item(draft).await
    }

    /// Texts of the items most similar to `query`, ready to pass as
    /// knowledge snippets to a completion.
    pub async fn snippets_for(&self, query: &str, limit: Option<usize>) -> Result<Vec<String>> {
        Ok(self
            .search_items(query, limit)
            .await?
            .into_iter()
            .map(|item| item.text)
            .filter(|text| !text.trim().is_empty())
            .collect())
    }
}

/// Tags are a set: drop repeats, keeping first-seen order.
fn unique_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter().filter(|tag| seen.insert(tag.clone())).collect()
}

/// Build the draft stored for a conversation.
pub fn memory_draft(turns: &[ConversationTurn], conversation_id: &str) -> KnowledgeDraft {
    let text = turns
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    KnowledgeDraft {
        title: format!("Chat memory {conversation_id}"),
        text,
        tags: vec![MEMORY_TAG.to_owned()],
        source: Some(MEMORY_SOURCE.to_owned()),
    }
}
