//! Seams between the orchestration layer and upstream providers.
//!
//! [`GatewayClient`](crate::gateway::GatewayClient) implements all four
//! traits. Tests and alternative deployments can substitute their own.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{ByteChunkStream, ConversationTurn, EmbeddingVector, TextChunkStream};

/// Produces chat completions.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Stream completion chunks in arrival order.
    async fn completion_stream(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
    ) -> Result<TextChunkStream>;

    /// Return the full completion text.
    async fn completion_once(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
    ) -> Result<String>;
}

/// Synthesizes speech.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Stream encoded audio for `text`.
    async fn speech_stream(&self, text: &str, voice_id: Option<&str>) -> Result<ByteChunkStream>;
}

/// Turns text into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;
}

/// Turns audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one clip.
    async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String>;
}
