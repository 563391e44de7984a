//! Ledgermatch CLI - Transaction categorizer
//!
//! Usage:
//!   ledgermatch categorize -t ledger.csv -r rules.csv   Categorise a ledger
//!   ledgermatch normalize "TESCO STORE 1234"            Show matching keys
//!   ledgermatch score -r rules.csv "SHELL GARAGE"       Rank candidates
//!   ledgermatch embed-check                             Test embedding backend

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Categorize {
            transactions,
            rules,
            output,
            sheet,
            rules_sheet,
            categories_sheet,
            strategy,
            threshold,
            auto_approve,
            suggestions,
            values,
            tax_rules,
            directional,
            edge_cases,
            report,
        } => {
            let overrides = commands::ConfigOverrides {
                strategy,
                threshold,
                auto_approve,
                suggestions,
                tax_rules,
                directional,
                edge_cases,
            };
            let options = commands::CategorizeOptions {
                transactions,
                rules,
                output,
                sheet,
                rules_sheet,
                categories_sheet,
                values,
                report,
            };
            commands::cmd_categorize(config_path, &overrides, &options)
                .await
                .map(|_| ())
        }
        Commands::Normalize { texts } => commands::cmd_normalize(&texts),
        Commands::Score {
            description,
            rules,
            sheet,
            strategy,
            top,
            json,
        } => {
            let overrides = commands::ConfigOverrides {
                strategy,
                ..Default::default()
            };
            commands::cmd_score(
                config_path,
                &overrides,
                &rules,
                sheet.as_deref(),
                &description,
                top,
                json,
            )
            .await
        }
        Commands::EmbedCheck { text } => commands::cmd_embed_check(config_path, &text).await,
    }
}
