//! Pluggable text embedding backends
//!
//! The semantic strategy turns descriptions and category labels into dense
//! vectors and compares them by cosine similarity.
//!
//! # Architecture
//!
//! - `EmbeddingBackend` trait: the interface every backend implements
//! - `Embedder` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaEmbedder`, `MockEmbedder`
//!
//! # Configuration
//!
//! Selected by `[embedding]` in the engine config, or by environment:
//! - `EMBEDDING_BACKEND`: ollama (default) or mock
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_EMBED_MODEL`: embedding model (default: all-minilm)

mod mock;
mod ollama;

pub use mock::{MockEmbedder, MOCK_DIMENSION};
pub use ollama::OllamaEmbedder;

use async_trait::async_trait;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};
use crate::error::{Error, Result};

/// Trait defining the interface for all embedding backends
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts; one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Model used for embeddings
    fn model(&self) -> &str;

    /// Host the backend talks to
    fn host(&self) -> &str;
}

/// Concrete embedder enum
#[derive(Clone)]
pub enum Embedder {
    /// Ollama `/api/embed`
    Ollama(OllamaEmbedder),
    /// Deterministic in-process vectors for tests and offline runs
    Mock(MockEmbedder),
}

impl Embedder {
    /// Build the backend named in config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        match config.backend {
            EmbeddingBackendKind::Ollama => {
                let host = config.host.as_deref().ok_or_else(|| {
                    Error::Config(
                        "Ollama embedding backend needs a host (set OLLAMA_HOST or embedding.host)"
                            .into(),
                    )
                })?;
                Ok(Embedder::Ollama(OllamaEmbedder::new(
                    host,
                    &config.model,
                    config.timeout(),
                )?))
            }
            EmbeddingBackendKind::Mock => Ok(Embedder::mock()),
        }
    }

    /// Create a mock embedder
    pub fn mock() -> Self {
        Embedder::Mock(MockEmbedder::new())
    }
}

// Delegate to the inner backend
#[async_trait]
impl EmbeddingBackend for Embedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Embedder::Ollama(b) => b.embed(texts).await,
            Embedder::Mock(b) => b.embed(texts).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            Embedder::Ollama(b) => b.health_check().await,
            Embedder::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            Embedder::Ollama(b) => b.model(),
            Embedder::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            Embedder::Ollama(b) => b.host(),
            Embedder::Mock(b) => b.host(),
        }
    }
}
