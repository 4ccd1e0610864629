//! Upstream gateway client.
//!
//! One [`GatewayClient`] talks to every upstream provider:
//!
//! - chat completions (streamed `data:` lines or a one-shot JSON reply),
//! - audio transcription (multipart upload),
//! - text embeddings,
//! - streaming text-to-speech (raw audio bytes).
//!
//! Every non-success HTTP status is converted into a single
//! [`RelayError::Upstream`] carrying the status and body, so callers never see
//! transport-specific error types.
//!
//! # Examples
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use voxrelay::config::RelayConfig;
//! use voxrelay::gateway::GatewayClient;
//! use voxrelay::types::ConversationTurn;
//!
//! # async fn example() -> voxrelay::error::Result<()> {
//! let config = RelayConfig::default();
//! let gateway = GatewayClient::new(config.gateway, config.speech);
//!
//! let turns = vec![ConversationTurn::user("Hello")];
//! let mut stream = gateway.completion_stream(&turns, None).await?;
//! while let Some(chunk) = stream.next().await {
//!     println!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod embedding;
pub mod speech;
pub mod sse;
pub mod transcription;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;
use url::Url;

use crate::config::{GatewayConfig, RelayConfig, SpeechConfig};
use crate::error::{RelayError, Result, UpstreamService};
use crate::provider::{CompletionBackend, Embedder, SpeechBackend, Transcriber};
use crate::types::{ByteChunkStream, ConversationTurn, EmbeddingVector, TextChunkStream};

/// Client for the completion, transcription, embedding and speech providers.
///
/// Cheap to clone; clones share the underlying connection pool but every call
/// owns its own response.
#[derive(Clone)]
pub struct GatewayClient {
    gateway: GatewayConfig,
    speech: SpeechConfig,
    http: reqwest::Client,
}

impl fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.gateway.base_url)
            .field("chat_model", &self.gateway.chat_model)
            .field("speech_base_url", &self.speech.base_url)
            .finish()
    }
}

impl GatewayClient {
    /// Create a gateway client from its provider settings.
    pub fn new(gateway: GatewayConfig, speech: SpeechConfig) -> Self {
        Self {
            gateway,
            speech,
            http: reqwest::Client::new(),
        }
    }

    /// Create a gateway client from the full relay configuration.
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.gateway.clone(), config.speech.clone())
    }

    fn gateway_url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.gateway.base_url, segments)
    }

    fn speech_url(&self, segments: &[&str]) -> Result<Url> {
        endpoint(&self.speech.base_url, segments)
    }
}

/// Join path segments onto a base URL, percent-encoding each segment.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RelayError::Configuration(format!("invalid base URL {base:?}: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| RelayError::Configuration(format!("base URL {base:?} cannot carry a path")))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

/// Pass a successful response through, or turn any other status into
/// [`RelayError::Upstream`] with the best-effort decoded body.
pub(crate) async fn ensure_success(
    service: UpstreamService,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = match response.bytes().await {
        Ok(body) if !body.is_empty() => String::from_utf8_lossy(&body).into_owned(),
        Ok(_) => status
            .canonical_reason()
            .unwrap_or("empty error body")
            .to_owned(),
        Err(_) => "<unable to decode error payload>".to_owned(),
    };
    warn!(%service, status = status.as_u16(), "upstream returned error status");
    Err(RelayError::upstream_status(service, status.as_u16(), detail))
}

/// Map a transport failure (connect, timeout, body read) to an upstream error.
pub(crate) fn transport_error(service: UpstreamService) -> impl Fn(reqwest::Error) -> RelayError {
    move |e| {
        let detail = if e.is_timeout() {
            format!("timed out: {e}")
        } else {
            e.to_string()
        };
        warn!(%service, error = %detail, "upstream transport failure");
        RelayError::upstream_transport(service, detail)
    }
}

#[async_trait]
impl CompletionBackend for GatewayClient {
    async fn completion_stream(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
    ) -> Result<TextChunkStream> {
        GatewayClient::completion_stream(self, turns, knowledge_snippets).await
    }

    async fn completion_once(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
    ) -> Result<String> {
        GatewayClient::completion_once(self, turns, knowledge_snippets).await
    }
}

#[async_trait]
impl SpeechBackend for GatewayClient {
    async fn speech_stream(&self, text: &str, voice_id: Option<&str>) -> Result<ByteChunkStream> {
        GatewayClient::speech_stream(self, text, voice_id).await
    }
}

#[async_trait]
impl Embedder for GatewayClient {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        GatewayClient::embed(self, text).await
    }
}

#[async_trait]
impl Transcriber for GatewayClient {
    async fn transcribe(&self, audio: Bytes, mime_type: &str) -> Result<String> {
        GatewayClient::transcribe(self, audio, mime_type).await
    }
}
