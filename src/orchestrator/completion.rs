//! Completion orchestration.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::provider::CompletionBackend;
use crate::types::{ConversationTurn, TextChunkStream};

/// What [`CompletionOrchestrator::respond`] hands back.
pub enum CompletionReply {
    /// Chunks as they arrive from upstream. Framing is the caller's concern.
    Stream(TextChunkStream),
    /// The full completion text.
    Text(String),
}

impl fmt::Debug for CompletionReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("CompletionReply::Stream(..)"),
            Self::Text(text) => f.debug_tuple("CompletionReply::Text").field(text).finish(),
        }
    }
}

/// Routes a conversation to a streamed or one-shot completion.
#[derive(Clone)]
pub struct CompletionOrchestrator {
    backend: Arc<dyn CompletionBackend>,
}

impl CompletionOrchestrator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Produce a completion for `turns`.
    ///
    /// With `streaming` the backend stream is returned untouched, with no
    /// extra buffering. Otherwise the one-shot text is returned. Knowledge
    /// snippets are injected the same way in both modes.
    pub async fn respond(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
        streaming: bool,
    ) -> Result<CompletionReply> {
        debug!(
            turns = turns.len(),
            snippets = knowledge_snippets.map_or(0, <[String]>::len),
            streaming,
            "completion requested"
        );
        if streaming {
            let stream = self.backend.completion_stream(turns, knowledge_snippets).await?;
            Ok(CompletionReply::Stream(stream))
        } else {
            let text = self.backend.completion_once(turns, knowledge_snippets).await?;
            Ok(CompletionReply::Text(text))
        }
    }
}
