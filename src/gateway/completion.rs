//! Chat completion requests: prompt assembly, streaming and one-shot calls.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use super::sse::{DataLine, EventLineDecoder};
use super::{GatewayClient, ensure_success, transport_error};
use crate::error::{RelayError, Result, UpstreamService};
use crate::types::{ConversationTurn, Role, TextChunkStream};

const SERVICE: UpstreamService = UpstreamService::Completion;

// ── Prompt assembly ───────────────────────────────────────────

/// Build the system turn injected ahead of the conversation.
///
/// Non-blank snippets are joined with newlines. Returns `None` when there is
/// no non-blank snippet at all.
pub fn knowledge_preamble(snippets: Option<&[String]>) -> Option<String> {
    let joined = snippets?
        .iter()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!joined.is_empty()).then_some(joined)
}

/// Assemble the message list sent upstream: `[system?] + turns`.
///
/// # Errors
///
/// Returns [`RelayError::EmptyRequest`] when `turns` is empty.
pub fn assemble_messages(
    turns: &[ConversationTurn],
    knowledge_snippets: Option<&[String]>,
) -> Result<Vec<serde_json::Value>> {
    if turns.is_empty() {
        return Err(RelayError::EmptyRequest(
            "at least one chat message is required to request a completion".to_owned(),
        ));
    }

    let mut messages = Vec::with_capacity(turns.len() + 1);
    if let Some(preamble) = knowledge_preamble(knowledge_snippets) {
        messages.push(message_json(Role::System, &preamble));
    }
    messages.extend(turns.iter().map(|t| message_json(t.role, &t.content)));
    Ok(messages)
}

fn message_json(role: Role, content: &str) -> serde_json::Value {
    serde_json::json!({
        "role": role.as_str(),
        "content": content,
    })
}

/// Build the JSON request body for the chat completions endpoint.
pub fn build_completion_request(
    model: &str,
    turns: &[ConversationTurn],
    knowledge_snippets: Option<&[String]>,
    stream: bool,
) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "model": model,
        "messages": assemble_messages(turns, knowledge_snippets)?,
        "stream": stream,
    }))
}

// ── One-shot response shape ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GatewayClient {
    /// Stream completion chunks for the conversation.
    ///
    /// Each non-blank `data:` line of the upstream response becomes one chunk,
    /// in arrival order. The stream ends at the `[DONE]` sentinel or upstream
    /// EOF; dropping it early closes the connection without draining.
    ///
    /// # Errors
    ///
    /// - [`RelayError::EmptyRequest`] when `turns` is empty.
    /// - [`RelayError::Configuration`] when no credential is configured.
    /// - [`RelayError::Upstream`] when the request fails or returns a
    ///   non-success status.
    pub async fn completion_stream(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
    ) -> Result<TextChunkStream> {
        let body =
            build_completion_request(&self.gateway.chat_model, turns, knowledge_snippets, true)?;
        let response = self.send_completion(&body, "text/event-stream").await?;
        Ok(Box::pin(chunk_stream(response.bytes_stream())))
    }

    /// Request a full completion in one response.
    ///
    /// Prompt assembly and validation are identical to
    /// [`completion_stream`](Self::completion_stream).
    pub async fn completion_once(
        &self,
        turns: &[ConversationTurn],
        knowledge_snippets: Option<&[String]>,
    ) -> Result<String> {
        let body =
            build_completion_request(&self.gateway.chat_model, turns, knowledge_snippets, false)?;
        let response = self.send_completion(&body, "application/json").await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| RelayError::upstream_transport(SERVICE, format!("invalid completion body: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }

    async fn send_completion(
        &self,
        body: &serde_json::Value,
        accept: &str,
    ) -> Result<reqwest::Response> {
        let api_key = self.gateway.require_api_key()?;
        let url = self.gateway_url(&["chat", "completions"])?;
        debug!(%url, model = %self.gateway.chat_model, "sending completion request");

        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .header(reqwest::header::ACCEPT, accept)
            .json(body)
            .send()
            .await
            .map_err(transport_error(SERVICE))?;

        ensure_success(SERVICE, response).await
    }
}

// ── Chunk stream ──────────────────────────────────────────────

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Internal state for the chunk stream.
///
/// `body` is dropped as soon as the sentinel or EOF is seen, which releases
/// the connection even while buffered chunks are still being handed out.
struct ChunkState {
    body: Option<ByteStream>,
    decoder: EventLineDecoder,
    pending: VecDeque<String>,
    emitted: usize,
}

impl ChunkState {
    fn release(&mut self) {
        if self.body.take().is_some() {
            debug!(chunks = self.emitted, "completion stream finished");
        }
    }
}

/// Turn a raw response body into a stream of chunks.
///
/// A read error yields one `Err` item after the chunks already delivered and
/// then ends the stream.
pub fn chunk_stream(
    body: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    let body: ByteStream = Box::pin(body);
    futures_util::stream::unfold(
        Some(ChunkState {
            body: Some(body),
            decoder: EventLineDecoder::new(),
            pending: VecDeque::new(),
            emitted: 0,
        }),
        |state| async move {
            let mut state = state?;
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    state.emitted += 1;
                    return Some((Ok(chunk), Some(state)));
                }

                let body = state.body.as_mut()?;
                match body.next().await {
                    Some(Ok(bytes)) => {
                        for line in state.decoder.push(&bytes) {
                            match line {
                                DataLine::Chunk(chunk) => state.pending.push_back(chunk),
                                DataLine::Done => state.release(),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let err = transport_error(SERVICE)(e);
                        return Some((Err(err), None));
                    }
                    None => {
                        if let Some(DataLine::Chunk(chunk)) = state.decoder.flush() {
                            state.pending.push_back(chunk);
                        }
                        state.release();
                    }
                }
            }
        },
    )
}
