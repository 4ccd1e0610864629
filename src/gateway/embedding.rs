//! Text embeddings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GatewayClient, ensure_success, transport_error};
use crate::error::{RelayError, Result, UpstreamService};
use crate::types::EmbeddingVector;

const SERVICE: UpstreamService = UpstreamService::Embedding;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl GatewayClient {
    /// Embed `text` with the configured embedding model.
    ///
    /// The vector is returned exactly as the model produced it; its length is
    /// the model's dimensionality.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Configuration`] when no credential is configured.
    /// - [`RelayError::Upstream`] on failure, timeout, or when the response
    ///   carries no embedding.
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let api_key = self.gateway.require_api_key()?;
        let url = self.gateway_url(&["embeddings"])?;
        let request = EmbeddingRequest {
            input: text,
            model: &self.gateway.embedding_model,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .timeout(self.gateway.embedding_timeout())
            .json(&request)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let response = ensure_success(SERVICE, response).await?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_transport(SERVICE, format!("invalid embedding body: {e}")))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RelayError::upstream_transport(SERVICE, "no embedding returned"))?;
        debug!(dimensions = vector.len(), "embedding received");
        Ok(vector)
    }
}
