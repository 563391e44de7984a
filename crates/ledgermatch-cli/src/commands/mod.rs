//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config resolution, engine construction)
//! - `categorize` - Categorise a full ledger and write the output table
//! - `embed` - Embedding backend health check
//! - `normalize` - Show normalized matching keys
//! - `score` - Rank candidates for a single description

pub mod categorize;
pub mod core;
pub mod embed;
pub mod normalize;
pub mod score;

// Re-export command functions for main.rs
pub use categorize::*;
pub use self::core::*;
pub use embed::*;
pub use normalize::*;
pub use score::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
