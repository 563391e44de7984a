//! Ledgermatch Core Library
//!
//! Matching engine that assigns spending categories to bank transactions:
//! - Description normalization (boilerplate and reference-number stripping)
//! - Lexical hybrid fuzzy scoring against a rulebook
//! - Semantic scoring via pluggable embedding backends (Ollama, mock)
//! - Bounded LRU match cache
//! - Threshold, auto-approve and suggestion policy
//! - Optional directional-merchant (tax) prefixes on output categories
//! - Ledger and rulebook I/O (CSV, spreadsheets) and run reports

pub mod cache;
pub mod config;
pub mod embed;
pub mod engine;
pub mod error;
pub mod fuzz;
pub mod ledger;
pub mod normalize;
pub mod report;
pub mod rules;
pub mod scorer;
pub mod tax;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{CacheStats, MatchCache};
pub use config::{EmbeddingBackendKind, EmbeddingConfig, EngineConfig, Strategy, TaxRulesConfig};
pub use embed::{Embedder, EmbeddingBackend, MockEmbedder, OllamaEmbedder};
pub use engine::{Categorizer, ClassificationResult, RankedCandidate, Suggestion, UNCATEGORISED};
pub use error::{Error, Result};
pub use ledger::{Ledger, Table};
pub use normalize::normalize;
pub use report::RunReport;
pub use rules::{Rule, Rulebook};
pub use scorer::{LexicalScorer, Scorer, SemanticScorer};
pub use tax::TaxRules;
