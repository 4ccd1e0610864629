//! Audio transcription via multipart upload.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{GatewayClient, ensure_success, transport_error};
use crate::error::{RelayError, Result, UpstreamService};

const SERVICE: UpstreamService = UpstreamService::Transcription;

/// File name attached to the uploaded audio part.
const AUDIO_FILE_NAME: &str = "audio";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

impl GatewayClient {
    /// Transcribe an audio clip.
    ///
    /// `mime_type` is sent as the content type of the uploaded part. A response
    /// without a `text` field yields an empty transcript.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Configuration`] when no credential is configured.
    /// - [`RelayError::InvalidInput`] when `mime_type` is not a valid MIME type.
    /// - [`RelayError::Upstream`] on failure or timeout.
    pub async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String> {
        let api_key = self.gateway.require_api_key()?;
        let url = self.gateway_url(&["audio", "transcriptions"])?;
        let size = audio.len();

        let file = Part::stream_with_length(audio, size as u64)
            .file_name(AUDIO_FILE_NAME)
            .mime_str(mime_type)
            .map_err(|e| RelayError::InvalidInput(format!("invalid audio type {mime_type:?}: {e}")))?;
        let form = Form::new()
            .text("model", self.gateway.transcription_model.clone())
            .part("file", file);

        debug!(%url, bytes = size, mime_type, "uploading audio for transcription");
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .timeout(self.gateway.transcription_timeout())
            .multipart(form)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let response = ensure_success(SERVICE, response).await?;

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_transport(SERVICE, format!("invalid transcription body: {e}")))?;
        Ok(parsed.text.unwrap_or_default())
    }
}
