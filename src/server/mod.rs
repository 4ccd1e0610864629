//! HTTP surface for the relay.
//!
//! ## Endpoints
//!
//! - `POST /completions`: streamed (SSE) or one-shot completion
//! - `POST /speech`: streamed `audio/mpeg`
//! - `POST /transcriptions`: raw audio body in, `{text}` out
//! - `POST /knowledge`: store a knowledge item
//! - `GET /knowledge/search`: semantic search
//! - `POST /knowledge/remember`: store a conversation as memory
//! - `GET /health`: liveness

pub mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{RelayConfig, ServerConfig};
use crate::error::{RelayError, Result};
use crate::gateway::GatewayClient;
use crate::knowledge::KnowledgeService;
use crate::orchestrator::{CompletionOrchestrator, SpeechOrchestrator};
use crate::provider::Transcriber;

pub use error::{ErrorBody, ErrorResponse};

/// Upper bound for an uploaded audio clip.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub completion: CompletionOrchestrator,
    pub speech: SpeechOrchestrator,
    pub transcriber: Arc<dyn Transcriber>,
    pub knowledge: KnowledgeService,
}

impl AppState {
    /// Wire every component to one shared [`GatewayClient`].
    pub fn from_config(config: &RelayConfig) -> Self {
        let gateway = Arc::new(GatewayClient::from_config(config));
        Self {
            completion: CompletionOrchestrator::new(gateway.clone()),
            speech: SpeechOrchestrator::new(gateway.clone()),
            transcriber: gateway.clone(),
            knowledge: KnowledgeService::new(gateway, config.vector.clone()),
        }
    }
}

/// Build the router without binding it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/completions", post(routes::completions))
        .route("/speech", post(routes::speech))
        .route(
            "/transcriptions",
            post(routes::transcriptions).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/knowledge", post(routes::create_knowledge))
        .route("/knowledge/search", get(routes::search_knowledge))
        .route("/knowledge/remember", post(routes::remember_conversation))
        .with_state(state)
}

/// A running relay server.
pub struct RelayServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RelayServer {
    /// Start serving in a background task.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign).
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(state: AppState, config: &ServerConfig) -> Result<Self> {
        let app = router(state);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            RelayError::Io(std::io::Error::new(e.kind(), format!("bind {bind_addr} failed: {e}")))
        })?;
        let addr = listener.local_addr()?;

        info!("relay listening on http://{addr}");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("relay server error: {e}");
            }
        });

        Ok(Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("relay server task ended abnormally: {e}");
        }
        info!("relay stopped");
    }
}

impl Drop for RelayServer {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
