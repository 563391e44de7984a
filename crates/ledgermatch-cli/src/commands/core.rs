//! Shared command utilities: config resolution and engine construction

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ledgermatch_core::{
    Categorizer, Embedder, EmbeddingBackend, EngineConfig, Rulebook, Scorer, Strategy, Table,
};
use tracing::info;

/// Per-invocation overrides from command-line flags
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub strategy: Option<String>,
    pub threshold: Option<f64>,
    pub auto_approve: Option<f64>,
    pub suggestions: Option<usize>,
    /// Turn on directional-merchant prefixes
    pub tax_rules: bool,
    /// Directional merchant list; implies `tax_rules`
    pub directional: Option<PathBuf>,
    pub edge_cases: Option<PathBuf>,
}

/// Load the engine config and apply command-line overrides
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(path).context("Failed to load engine config")?;

    if let Some(strategy) = &overrides.strategy {
        config.strategy = strategy.parse()?;
    }
    if let Some(threshold) = overrides.threshold {
        config.match_threshold = threshold;
    }
    if let Some(auto_approve) = overrides.auto_approve {
        config.auto_approve_threshold = auto_approve;
    }
    if let Some(n) = overrides.suggestions {
        config.num_suggestions = n;
    }
    if overrides.tax_rules {
        config.tax_rules.enabled = true;
    }
    if let Some(path) = &overrides.directional {
        config.tax_rules.enabled = true;
        config.tax_rules.directional_file = Some(path.clone());
    }
    if let Some(path) = &overrides.edge_cases {
        config.tax_rules.edge_cases_file = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Build the scorer for the configured strategy and wrap it in an engine
///
/// Lexical mode reads a rulebook (Description + Category). Semantic mode
/// reads a category list (Category) and requires a reachable embedding
/// backend.
pub async fn build_engine(
    config: EngineConfig,
    rules: &Path,
    sheet: Option<&str>,
) -> Result<Categorizer> {
    let table = Table::load(rules, sheet)
        .with_context(|| format!("Failed to read rules from {}", rules.display()))?;

    let (rulebook, scorer) = match config.strategy {
        Strategy::Lexical => {
            let rulebook = Rulebook::from_table(&table)?;
            let scorer = Scorer::lexical(&rulebook, config.parallel);
            (rulebook, scorer)
        }
        Strategy::Semantic => {
            let rulebook = Rulebook::categories_from_table(&table)?;
            let embedder = Embedder::from_config(&config.embedding)?;
            if !embedder.health_check().await {
                bail!(
                    "Embedding backend at {} is not reachable (model {})",
                    embedder.host(),
                    embedder.model()
                );
            }
            info!("Using embedding model {} at {}", embedder.model(), embedder.host());
            let scorer = Scorer::semantic(embedder, &rulebook, config.batch_size).await?;
            (rulebook, scorer)
        }
    };

    Ok(Categorizer::new(config, rulebook, scorer)?)
}
