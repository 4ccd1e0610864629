//! HTTP client for a Qdrant-compatible vector index.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::payload::decode_hit;
use crate::config::VectorConfig;
use crate::error::{RelayError, Result, UpstreamService};
use crate::gateway::{endpoint, ensure_success, transport_error};
use crate::types::{KnowledgeItem, VectorIndexRecord};

const SERVICE: UpstreamService = UpstreamService::VectorIndex;

/// Result count used by [`VectorIndexClient::search`] callers that do not pick one.
pub const DEFAULT_SEARCH_LIMIT: usize = 4;

/// Rewrite `qdrant://` and `qdrant+https://` URLs into plain HTTP(S) ones.
///
/// Other URLs pass through unchanged.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("qdrant+https://") {
        format!("https://{rest}")
    } else if let Some(rest) = raw.strip_prefix("qdrant://") {
        format!("http://{rest}")
    } else {
        raw.to_owned()
    }
}

// Hits stay untyped so one malformed entry cannot fail the whole body.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<Value>,
}

fn decode_entry(entry: &Value) -> Option<KnowledgeItem> {
    let Some(hit) = entry.as_object() else {
        warn!(hit = %entry, "skipping search hit that is not an object");
        return None;
    };
    decode_hit(
        hit.get("id").unwrap_or(&Value::Null),
        hit.get("payload").and_then(Value::as_object),
    )
}

/// A connection to the vector index.
///
/// Each instance owns its own connection and must be released with
/// [`close`](Self::close), which consumes it. Prefer [`scoped`](Self::scoped),
/// which guarantees the release.
#[derive(Debug)]
pub struct VectorIndexClient {
    base_url: String,
    http: reqwest::Client,
}

impl VectorIndexClient {
    /// Open a client for the configured index.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Configuration`] when the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn connect(config: &VectorConfig) -> Result<Self> {
        let base_url = normalize_url(&config.url);
        Url::parse(&base_url).map_err(|e| {
            RelayError::Configuration(format!("invalid vector index URL {:?}: {e}", config.url))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| RelayError::Configuration(format!("cannot build index client: {e}")))?;

        debug!(url = %base_url, "vector index client opened");
        Ok(Self { base_url, http })
    }

    /// Open a client, run `f` with it and close it, whatever `f` returns.
    ///
    /// ```rust,no_run
    /// use voxrelay::config::VectorConfig;
    /// use voxrelay::index::VectorIndexClient;
    ///
    /// # async fn example(vector: Vec<f32>) -> voxrelay::error::Result<()> {
    /// let config = VectorConfig::default();
    /// let hits = VectorIndexClient::scoped(&config, move |client| {
    ///     Box::pin(async move { client.search("knowledge_items", &vector, 4).await })
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<T, F>(config: &VectorConfig, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a VectorIndexClient) -> BoxFuture<'a, Result<T>>,
    {
        let client = Self::connect(config)?;
        let outcome = f(&client).await;
        client.close();
        outcome
    }

    /// Normalized base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create the collection if it does not exist yet.
    ///
    /// An "already exists" answer (409) counts as success, so repeated calls
    /// are harmless.
    pub async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        let url = self.collection_url(name, &[])?;
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine",
            }
        });

        let response = self
            .http
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            debug!(collection = name, "collection already exists");
            return Ok(());
        }
        ensure_success(SERVICE, response).await?;
        debug!(collection = name, vector_size, "collection ready");
        Ok(())
    }

    /// Write a batch of records.
    ///
    /// An empty batch sends nothing.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidInput`] when the vectors in the batch disagree
    ///   in length.
    /// - [`RelayError::Upstream`] on a non-success status.
    pub async fn upsert(&self, name: &str, records: &[VectorIndexRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let dimensions = first.vector.len();
        if let Some(odd) = records.iter().find(|r| r.vector.len() != dimensions) {
            return Err(RelayError::InvalidInput(format!(
                "record {} has {} dimensions, expected {dimensions}",
                odd.id,
                odd.vector.len()
            )));
        }

        let mut url = self.collection_url(name, &["points"])?;
        url.query_pairs_mut().append_pair("wait", "true");

        let response = self
            .http
            .put(url)
            .json(&json!({ "points": records }))
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        ensure_success(SERVICE, response).await?;
        debug!(collection = name, count = records.len(), "points upserted");
        Ok(())
    }

    /// Nearest-neighbour search, most similar first.
    ///
    /// Hits with unusable ids are skipped; other defects are filled in with
    /// defaults, so one bad record never fails the query.
    pub async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<KnowledgeItem>> {
        let url = self.collection_url(name, &["points", "search"])?;
        let body = json!({
            "vector": query_vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;
        let response = ensure_success(SERVICE, response).await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_transport(SERVICE, format!("invalid search body: {e}")))?;

        let total = parsed.result.len();
        let items: Vec<KnowledgeItem> = parsed
            .result
            .iter()
            .filter_map(decode_entry)
            .collect();
        if items.len() < total {
            warn!(collection = name, skipped = total - items.len(), "search hits skipped");
        }
        debug!(collection = name, hits = items.len(), "search finished");
        Ok(items)
    }

    /// Release the connection. The client cannot be used afterwards.
    pub fn close(self) {
        debug!(url = %self.base_url, "vector index client closed");
    }

    fn collection_url(&self, name: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["collections", name];
        segments.extend_from_slice(rest);
        endpoint(&self.base_url, &segments)
    }
}
