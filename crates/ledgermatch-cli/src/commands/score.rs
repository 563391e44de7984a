//! Single-description scoring command

use std::path::Path;

use anyhow::Result;
use ledgermatch_core::normalize::normalize;

use super::core::{build_engine, resolve_config, ConfigOverrides};
use super::truncate;

/// Rank every candidate for one description and show the decision
pub async fn cmd_score(
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
    rules: &Path,
    sheet: Option<&str>,
    description: &str,
    top: usize,
    json: bool,
) -> Result<()> {
    let config = resolve_config(config_path, overrides)?;
    let engine = build_engine(config, rules, sheet).await?;

    let ranked = engine.rank(description).await?;
    let result = engine.classify(description).await?;

    if json {
        let value = serde_json::json!({
            "description": description,
            "normalized": normalize(description),
            "result": result,
            "candidates": ranked.iter().take(top).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("🔍 \"{}\" → \"{}\"", description, normalize(description));
    println!("   ─────────────────────────────────────────────────────────────");
    if ranked.is_empty() {
        println!("   Nothing to match (empty after normalization)");
    }
    for candidate in ranked.iter().take(top) {
        let rule = candidate
            .rule
            .as_deref()
            .map(|r| format!(" [{}]", truncate(r, 30)))
            .unwrap_or_default();
        println!("   {:>6.2}  {}{}", candidate.score, candidate.category, rule);
    }
    println!();

    if result.is_categorised() {
        let approval = if result.auto_approved {
            "auto-approved"
        } else {
            "needs review"
        };
        println!("✅ {} ({:.2}, {})", result.category, result.score, approval);
    } else {
        println!("❓ {} (best {:.2})", result.category, result.score);
        for suggestion in &result.suggestions {
            println!("   • {}", suggestion);
        }
    }

    Ok(())
}
