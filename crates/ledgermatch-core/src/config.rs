//! Engine configuration
//!
//! Settings are read once at startup and are immutable for the run.
//!
//! ## Configuration Resolution
//!
//! 1. Explicit path (`--config`)
//! 2. Override in data dir (~/.local/share/ledgermatch/config/engine.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Environment variables then override the embedding backend:
//! - `EMBEDDING_BACKEND`: ollama or mock
//! - `OLLAMA_HOST`: Ollama server URL
//! - `OLLAMA_EMBED_MODEL`: embedding model name

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// How descriptions are compared with candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Hybrid fuzzy scoring against rule patterns
    Lexical,
    /// Embedding cosine similarity against category labels
    Semantic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lexical" | "fuzzy" => Ok(Self::Lexical),
            "semantic" | "embedding" => Ok(Self::Semantic),
            other => Err(Error::Config(format!("Unknown strategy: {}", other))),
        }
    }
}

/// Which embedding backend the semantic strategy talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    Ollama,
    Mock,
}

impl FromStr for EmbeddingBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!("Unknown embedding backend: {}", other))),
        }
    }
}

/// Embedding backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    /// Server URL; required for the ollama backend
    pub host: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::Ollama,
            host: None,
            model: "all-minilm".to_string(),
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Directional merchant prefixing (`Expense:` / `Refund:` / `Income:`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRulesConfig {
    pub enabled: bool,
    /// Rules whose matches are split by the sign of the row's value
    pub directional_file: Option<PathBuf>,
    /// Directional rules whose credits are income rather than refunds
    pub edge_cases_file: Option<PathBuf>,
}

/// Matching engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: Strategy,
    /// Minimum score (0-100) to accept the best candidate
    pub match_threshold: f64,
    /// Minimum score to mark a match as not needing review
    pub auto_approve_threshold: f64,
    /// Alternatives offered for uncategorised rows
    pub num_suggestions: usize,
    /// Suggestions must score strictly above this
    pub suggestion_min_score: f64,
    /// Memoized descriptions
    pub cache_size: usize,
    /// Rows per progress chunk
    pub chunk_size: usize,
    /// Texts per embedding request
    pub batch_size: usize,
    /// Score rows in parallel
    pub parallel: bool,
    pub embedding: EmbeddingConfig,
    pub tax_rules: TaxRulesConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Lexical,
            match_threshold: 70.0,
            auto_approve_threshold: 80.0,
            num_suggestions: 3,
            suggestion_min_score: 0.0,
            cache_size: 1000,
            chunk_size: 1000,
            batch_size: 32,
            parallel: true,
            embedding: EmbeddingConfig::default(),
            tax_rules: TaxRulesConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration (explicit path, then data dir override, then
    /// embedded defaults) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = load_config(path)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Apply embedding overrides from an environment lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("EMBEDDING_BACKEND") {
            self.embedding.backend = backend.parse()?;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.embedding.host = Some(host);
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            self.embedding.model = model;
        }
        Ok(())
    }

    /// Check thresholds and sizes; called before any row is processed
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);

        if !in_range(self.match_threshold) || self.match_threshold <= 0.0 {
            return Err(Error::Config(format!(
                "match_threshold must be in (0, 100], got {}",
                self.match_threshold
            )));
        }
        if !in_range(self.auto_approve_threshold) {
            return Err(Error::Config(format!(
                "auto_approve_threshold must be in [0, 100], got {}",
                self.auto_approve_threshold
            )));
        }
        if self.auto_approve_threshold < self.match_threshold {
            return Err(Error::InvalidThresholds {
                matched: self.match_threshold,
                auto_approve: self.auto_approve_threshold,
            });
        }
        if !self.suggestion_min_score.is_finite() || self.suggestion_min_score < 0.0 {
            return Err(Error::Config(format!(
                "suggestion_min_score must be >= 0, got {}",
                self.suggestion_min_score
            )));
        }
        if self.tax_rules.enabled && self.tax_rules.directional_file.is_none() {
            return Err(Error::Config(
                "tax_rules.enabled requires tax_rules.directional_file".into(),
            ));
        }
        for (name, value) in [
            ("cache_size", self.cache_size),
            ("chunk_size", self.chunk_size),
            ("batch_size", self.batch_size),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgermatch").join("config").join("engine.toml"))
}

/// Load configuration (override first, then default)
fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let content = if let Some(path) = explicit {
        // An explicit path that does not exist is a user error, not a fallback
        fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?
    } else {
        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("Using config override {}", path.display());
                fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config {}: {}", path.display(), e))
                })?
            }
            _ => DEFAULT_CONFIG.to_string(),
        }
    };

    EngineConfig::from_toml(&content)
}
