//! Speech orchestration.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::provider::SpeechBackend;
use crate::types::ByteChunkStream;

/// Relays synthesized audio without touching the bytes.
#[derive(Clone)]
pub struct SpeechOrchestrator {
    backend: Arc<dyn SpeechBackend>,
}

impl SpeechOrchestrator {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self { backend }
    }

    /// Stream audio for `text`, using the default voice when `voice_id` is `None`.
    pub async fn speak(&self, text: &str, voice_id: Option<&str>) -> Result<ByteChunkStream> {
        debug!(chars = text.chars().count(), voice = voice_id.unwrap_or("<default>"), "speech requested");
        self.backend.speech_stream(text, voice_id).await
    }
}
