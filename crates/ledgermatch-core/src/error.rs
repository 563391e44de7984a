//! Error types for ledgermatch

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column '{column}' in {input}")]
    MissingColumn { column: String, input: String },

    #[error("Rulebook is empty: no usable rules after cleaning")]
    EmptyRulebook,

    #[error(
        "Invalid thresholds: auto_approve_threshold ({auto_approve}) must be >= match_threshold ({matched})"
    )]
    InvalidThresholds { matched: f64, auto_approve: f64 },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Shorthand for a missing-column error
    pub fn missing_column(column: &str, input: &str) -> Self {
        Error::MissingColumn {
            column: column.to_string(),
            input: input.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
