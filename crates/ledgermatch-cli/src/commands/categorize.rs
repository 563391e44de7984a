//! Ledger categorization command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ledgermatch_core::{Ledger, RunReport, Strategy, TaxRules};
use tracing::info;

use super::core::{build_engine, resolve_config, ConfigOverrides};

/// Inputs and outputs for `categorize`
#[derive(Debug, Clone, Default)]
pub struct CategorizeOptions {
    pub transactions: PathBuf,
    pub rules: PathBuf,
    pub output: Option<PathBuf>,
    pub sheet: Option<String>,
    pub rules_sheet: Option<String>,
    pub categories_sheet: Option<String>,
    pub values: bool,
    pub report: Option<PathBuf>,
}

/// `<dir>/<stem>_categorized.csv` next to the input ledger
pub fn default_output_path(transactions: &Path) -> PathBuf {
    let stem = transactions
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transactions");
    transactions.with_file_name(format!("{}_categorized.csv", stem))
}

/// Categorise a ledger and write the augmented table
pub async fn cmd_categorize(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    options: &CategorizeOptions,
) -> Result<RunReport> {
    let config = resolve_config(config_path, overrides)?;
    let num_suggestions = config.num_suggestions;
    let auto_approve_threshold = config.auto_approve_threshold;
    let tax = TaxRules::from_config(&config.tax_rules).context("Failed to load tax rules")?;

    // Fail on missing columns before any embedding work
    let mut ledger = Ledger::load(&options.transactions, options.sheet.as_deref())
        .with_context(|| format!("Failed to read ledger {}", options.transactions.display()))?;
    info!(
        "Loaded {} transactions from {}",
        ledger.len(),
        options.transactions.display()
    );
    if options.values {
        ledger.derive_values()?;
    }

    let rules_sheet = match config.strategy {
        Strategy::Lexical => options.rules_sheet.as_deref(),
        Strategy::Semantic => options.categories_sheet.as_deref(),
    };
    let engine = build_engine(config, &options.rules, rules_sheet).await?;

    let results = engine.classify_all(&ledger.descriptions()).await?;
    let report = RunReport::from_results(&results, auto_approve_threshold)
        .with_cache_stats(engine.cache_stats());
    report.log();

    let output_path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&options.transactions));
    let table = ledger.into_output(&results, num_suggestions, tax.as_ref())?;
    table
        .save_csv(&output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    if let Some(report_path) = &options.report {
        report
            .save_json(report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    }

    println!();
    println!(
        "✅ Categorised {}/{} transactions ({:.1}%)",
        report.categorised, report.total, report.categorisation_rate
    );
    println!(
        "   {} auto-approved, {} need review",
        report.auto_approved,
        report.total - report.auto_approved
    );
    println!("   Output: {}", output_path.display());
    if let Some(report_path) = &options.report {
        println!("   Report: {}", report_path.display());
    }

    Ok(report)
}
