//! Streaming text-to-speech.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use super::{GatewayClient, ensure_success, transport_error};
use crate::error::{Result, UpstreamService};
use crate::types::ByteChunkStream;

const SERVICE: UpstreamService = UpstreamService::Speech;
const XI_API_KEY_HEADER: &str = "xi-api-key";
const AUDIO_MPEG: &str = "audio/mpeg";

impl GatewayClient {
    /// Synthesize `text` and stream the encoded audio as it arrives.
    ///
    /// Byte chunks are forwarded in upstream order without re-buffering.
    /// `voice_id` falls back to the configured default voice.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Configuration`](crate::error::RelayError::Configuration)
    ///   when no speech credential is configured. No request is sent.
    /// - [`RelayError::Upstream`](crate::error::RelayError::Upstream) on a
    ///   non-success status or transport failure.
    pub async fn speech_stream(&self, text: &str, voice_id: Option<&str>) -> Result<ByteChunkStream> {
        let api_key = self.speech.require_api_key()?;
        let voice = voice_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.speech.default_voice);
        let url = self.speech_url(&["text-to-speech", voice, "stream"])?;
        debug!(%url, voice, chars = text.chars().count(), "requesting speech stream");

        let body = serde_json::json!({
            "text": text,
            "voice_settings": {
                "stability": self.speech.stability,
                "similarity_boost": self.speech.similarity_boost,
            },
        });

        let response = self
            .http
            .post(url)
            .header(XI_API_KEY_HEADER, api_key)
            .header(reqwest::header::ACCEPT, AUDIO_MPEG)
            .json(&body)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let response = ensure_success(SERVICE, response).await?;

        Ok(Box::pin(audio_stream(response.bytes_stream())))
    }
}

/// Forward upstream audio bytes, ending after the first read error.
fn audio_stream(
    body: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<Bytes>> + Send {
    async_stream::stream! {
        let mut body = std::pin::pin!(body);
        let mut total = 0usize;
        while let Some(item) = body.next().await {
            match item {
                Ok(bytes) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    total += bytes.len();
                    yield Ok(bytes);
                }
                Err(e) => {
                    yield Err(transport_error(SERVICE)(e));
                    return;
                }
            }
        }
        debug!(bytes = total, "speech stream finished");
    }
}
