//! Test utilities for ledgermatch-core
//!
//! Provides a mock Ollama server speaking the `/api/tags` and `/api/embed`
//! endpoints, backed by the deterministic `MockEmbedder` vectors.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::embed::MockEmbedder;

#[derive(Clone)]
struct ServerState {
    embedder: MockEmbedder,
    embed_calls: Arc<AtomicUsize>,
    fail_embeds: bool,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    embed_calls: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    /// Start a server whose embed endpoint always returns 500
    pub async fn start_failing() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(fail_embeds: bool) -> Self {
        let embed_calls = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            embedder: MockEmbedder::new(),
            embed_calls: Arc::clone(&embed_calls),
            fail_embeds,
        };
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/embed", post(handle_embed))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            embed_calls,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of `/api/embed` requests served so far
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "all-minilm:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 45_000_000,
        }],
    })
}

/// Ollama embed endpoint
async fn handle_embed(
    State(state): State<ServerState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, StatusCode> {
    state.embed_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_embeds {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let inputs = match request.input {
        EmbedInput::One(text) => vec![text],
        EmbedInput::Many(texts) => texts,
    };
    Ok(Json(EmbedResponse {
        model: request.model,
        embeddings: inputs.iter().map(|t| state.embedder.vector(t)).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

/// Ollama accepts either a single string or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbedInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct EmbedRequest {
    model: String,
    input: EmbedInput,
}

#[derive(Debug, Serialize)]
struct EmbedResponse {
    model: String,
    embeddings: Vec<Vec<f32>>,
}
