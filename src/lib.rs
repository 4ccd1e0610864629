//! voxrelay: streaming relay between a chat client and upstream AI providers.
//!
//! The crate sits between a client and four external services:
//! Client → Orchestrator → Gateway / Index client → Provider
//!
//! # Architecture
//!
//! - **Gateway** ([`gateway`]): authenticated calls to the completion,
//!   transcription, embedding and speech providers, normalized into text
//!   chunk streams, one-shot text and raw byte streams
//! - **Index** ([`index`]): collection, upsert and search calls against a
//!   Qdrant-compatible vector index, with lenient payload decoding
//! - **Knowledge** ([`knowledge`]): embed-then-write and embed-then-search
//!   flows over the index
//! - **Orchestrators** ([`orchestrator`]): completion and speech pass-through
//!   used by the HTTP surface
//! - **Server** ([`server`]): thin `axum` router over the above
//!
//! Nothing buffers a full upstream response except the one-shot completion
//! mode. Dropping a stream releases its upstream connection.

pub mod config;
pub mod error;
pub mod gateway;
pub mod index;
pub mod knowledge;
pub mod orchestrator;
pub mod provider;
pub mod server;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use gateway::GatewayClient;
pub use index::VectorIndexClient;
pub use knowledge::KnowledgeService;
pub use orchestrator::{CompletionOrchestrator, CompletionReply, SpeechOrchestrator};
pub use types::{ConversationTurn, KnowledgeDraft, KnowledgeItem, Role};
