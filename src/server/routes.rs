//! Route handlers.

use std::convert::Infallible;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::error::{RelayError, Result};
use crate::orchestrator::CompletionReply;
use crate::types::{ConversationTurn, KnowledgeDraft, KnowledgeItem, Role, TextChunkStream};

/// Mime type assumed for uploads without a `Content-Type` header.
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub turns: Vec<ConversationTurn>,
    /// Explicit snippets. Takes precedence over `use_knowledge_base`.
    #[serde(default)]
    pub knowledge: Option<Vec<String>>,
    /// Retrieve snippets for the last user turn from the knowledge base.
    #[serde(default)]
    pub use_knowledge_base: bool,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub conversation_id: String,
    pub turns: Vec<ConversationTurn>,
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /completions`: SSE stream or `{content}`.
pub async fn completions(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> Result<Response> {
    let snippets = match request.knowledge {
        Some(snippets) => Some(snippets),
        None if request.use_knowledge_base => match last_user_content(&request.turns) {
            Some(query) => Some(state.knowledge.snippets_for(query, None).await?),
            None => None,
        },
        None => None,
    };

    let reply = state
        .completion
        .respond(&request.turns, snippets.as_deref(), request.stream)
        .await?;

    Ok(match reply {
        CompletionReply::Stream(stream) => sse_response(stream),
        CompletionReply::Text(content) => Json(CompletionResponse { content }).into_response(),
    })
}

fn last_user_content(turns: &[ConversationTurn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .find(|t| t.role == Role::User && !t.content.trim().is_empty())
        .map(|t| t.content.as_str())
}

/// Frame each chunk as one `data:` event. A failure becomes a final
/// `event: error` carrying the message.
fn sse_response(stream: TextChunkStream) -> Response {
    let events = stream.map(|item| {
        Ok::<_, Infallible>(match item {
            Ok(chunk) => Event::default().data(strip_cr(&chunk)),
            Err(e) => {
                debug!(code = e.code(), "completion stream failed mid-way");
                Event::default().event("error").data(strip_cr(&e.to_string()))
            }
        })
    });
    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

// Event data may not contain carriage returns.
fn strip_cr(text: &str) -> String {
    text.replace('\r', "")
}

/// `POST /speech`: audio streamed verbatim.
pub async fn speech(
    State(state): State<AppState>,
    Json(request): Json<SpeechRequest>,
) -> Result<Response> {
    let stream = state
        .speech
        .speak(&request.text, request.voice_id.as_deref())
        .await?;
    Ok((
        [
            (CONTENT_TYPE, "audio/mpeg"),
            (CONTENT_DISPOSITION, "inline; filename=speech.mp3"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// `POST /transcriptions`: raw audio body, mime type from `Content-Type`.
pub async fn transcriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
    audio: Bytes,
) -> Result<Json<TranscriptionResponse>> {
    if audio.is_empty() {
        return Err(RelayError::InvalidInput("audio body is empty".to_owned()));
    }
    let mime_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_AUDIO_MIME);

    let text = state.transcriber.transcribe(audio, mime_type).await?;
    Ok(Json(TranscriptionResponse { text }))
}

/// `POST /knowledge`
pub async fn create_knowledge(
    State(state): State<AppState>,
    Json(draft): Json<KnowledgeDraft>,
) -> Result<Json<KnowledgeItem>> {
    Ok(Json(state.knowledge.create_item(draft).await?))
}

/// `GET /knowledge/search?query=..&limit=..`
pub async fn search_knowledge(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<KnowledgeItem>>> {
    if params.query.trim().is_empty() {
        return Err(RelayError::InvalidInput("query must not be blank".to_owned()));
    }
    Ok(Json(
        state
            .knowledge
            .search_items(&params.query, params.limit)
            .await?,
    ))
}

/// `POST /knowledge/remember`
pub async fn remember_conversation(
    State(state): State<AppState>,
    Json(request): Json<RememberRequest>,
) -> Result<Json<KnowledgeItem>> {
    if request.turns.is_empty() {
        return Err(RelayError::EmptyRequest(
            "at least one turn is required to remember a conversation".to_owned(),
        ));
    }
    Ok(Json(
        state
            .knowledge
            .remember_conversation(&request.turns, &request.conversation_id)
            .await?,
    ))
}
