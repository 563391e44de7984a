//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ledgermatch - Categorise bank transactions against a rulebook
#[derive(Parser)]
#[command(name = "ledgermatch")]
#[command(about = "Fuzzy and semantic transaction categorizer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Categorise every row of a transaction ledger
    Categorize {
        /// Ledger file (CSV, or .xlsx/.xls/.ods) with a Description column
        #[arg(short, long)]
        transactions: PathBuf,

        /// Rulebook (Description + Category columns), or category list in semantic mode
        #[arg(short, long)]
        rules: PathBuf,

        /// Output CSV (defaults to <transactions>_categorized.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ledger sheet name for workbook input (defaults to the first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Rulebook sheet name for workbook rules (lexical strategy)
        #[arg(long)]
        rules_sheet: Option<String>,

        /// Category list sheet name for workbook rules (semantic strategy)
        #[arg(long)]
        categories_sheet: Option<String>,

        /// Matching strategy: lexical or semantic
        #[arg(short, long)]
        strategy: Option<String>,

        /// Minimum score (0-100) to accept a match
        #[arg(long)]
        threshold: Option<f64>,

        /// Minimum score (0-100) to auto-approve a match
        #[arg(long)]
        auto_approve: Option<f64>,

        /// Number of suggestions for uncategorised rows
        #[arg(long)]
        suggestions: Option<usize>,

        /// Add a signed Values column from credit/debit or amount/type columns
        #[arg(long)]
        values: bool,

        /// Prefix directional merchant matches with Expense/Refund/Income
        #[arg(long)]
        tax_rules: bool,

        /// Directional merchant list (description_clean column); implies --tax-rules
        #[arg(long)]
        directional: Option<PathBuf>,

        /// Refund edge cases: directional merchants whose credits are income
        #[arg(long)]
        edge_cases: Option<PathBuf>,

        /// Write the run summary as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the normalized matching key for descriptions
    Normalize {
        /// Raw descriptions
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Show how one description scores against every candidate
    Score {
        /// Description to score
        description: String,

        /// Rulebook (or category list in semantic mode)
        #[arg(short, long)]
        rules: PathBuf,

        /// Sheet name for workbook rules
        #[arg(long)]
        sheet: Option<String>,

        /// Matching strategy: lexical or semantic
        #[arg(short, long)]
        strategy: Option<String>,

        /// Candidates to show
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the configured embedding backend is reachable
    EmbedCheck {
        /// Sample text to embed
        #[arg(long, default_value = "TESCO STORE 1234")]
        text: String,
    },
}
