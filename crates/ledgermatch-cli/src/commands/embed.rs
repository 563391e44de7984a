//! Embedding backend commands

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};
use ledgermatch_core::{normalize, Embedder, EmbeddingBackend, EngineConfig};

/// Check the configured embedding backend and embed a sample text
pub async fn cmd_embed_check(config_path: Option<&Path>, text: &str) -> Result<()> {
    embed_check(&mut io::stdout(), config_path, text).await
}

pub(crate) async fn embed_check<W: Write>(
    out: &mut W,
    config_path: Option<&Path>,
    text: &str,
) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    writeln!(out, "🔍 Testing embedding backend...\n")?;

    let embedder = Embedder::from_config(&config.embedding)?;
    writeln!(out, "  Host:  {}", embedder.host())?;
    writeln!(out, "  Model: {}\n", embedder.model())?;

    // The health check can take up to the request timeout
    write!(out, "Checking availability... ")?;
    out.flush()?;
    if !embedder.health_check().await {
        writeln!(out, "❌ Failed")?;
        writeln!(out, "\nTo set up Ollama:")?;
        writeln!(out, "  1. Install Ollama: https://ollama.ai/download")?;
        writeln!(out, "  2. Start the server: ollama serve")?;
        writeln!(out, "  3. Pull the model: ollama pull {}", embedder.model())?;
        writeln!(out, "  4. Set environment variable: export OLLAMA_HOST=http://localhost:11434")?;
        bail!("Embedding backend at {} is not reachable", embedder.host());
    }
    writeln!(out, "✅ Connected")?;

    let key = normalize(text);
    let vectors = embedder.embed(&[key.clone()]).await?;
    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    writeln!(out, "  \"{}\" → {} dimensions", key, dimension)?;

    Ok(())
}
