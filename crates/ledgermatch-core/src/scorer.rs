//! Similarity scoring strategies
//!
//! A `Scorer` turns a batch of normalized descriptions into one score row per
//! description, with one column per candidate. Scores are on a 0-100 scale.
//!
//! - Lexical: candidates are the rulebook's normalized patterns, scored with
//!   `fuzz::hybrid_score`
//! - Semantic: candidates are the distinct category labels, scored by cosine
//!   similarity of embeddings mapped to `max(cos, 0) * 100`
//!
//! The scorer is built once at startup and handed to the engine.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::Strategy;
use crate::embed::{Embedder, EmbeddingBackend};
use crate::error::{Error, Result};
use crate::fuzz::hybrid_score;
use crate::normalize::basic;
use crate::rules::Rulebook;

/// Hybrid fuzzy scoring against rule patterns
#[derive(Debug, Clone)]
pub struct LexicalScorer {
    keys: Arc<[String]>,
    parallel: bool,
}

impl LexicalScorer {
    pub fn new(rulebook: &Rulebook, parallel: bool) -> Self {
        Self {
            keys: rulebook.rules().iter().map(|r| r.key.clone()).collect(),
            parallel,
        }
    }

    /// Scores of one query against every pattern, in rulebook order
    pub fn score_one(&self, query: &str) -> Vec<f64> {
        self.keys.iter().map(|key| hybrid_score(key, query)).collect()
    }

    pub fn score_queries(&self, queries: &[String]) -> Vec<Vec<f64>> {
        if self.parallel {
            queries.par_iter().map(|q| self.score_one(q)).collect()
        } else {
            queries.iter().map(|q| self.score_one(q)).collect()
        }
    }
}

/// Embedding similarity against category labels
///
/// Label vectors are computed once in `new`; queries are embedded per call
/// in batches of `batch_size`.
#[derive(Clone)]
pub struct SemanticScorer {
    embedder: Embedder,
    labels: Vec<String>,
    label_vectors: Vec<Vec<f32>>,
    batch_size: usize,
}

impl SemanticScorer {
    /// Embed the category labels and build the scorer
    pub async fn new(embedder: Embedder, labels: &[String], batch_size: usize) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::EmptyRulebook);
        }
        let batch_size = batch_size.max(1);
        // Labels keep their display form; only the embedded text is cleaned
        let texts: Vec<String> = labels
            .iter()
            .map(|label| match basic(label) {
                cleaned if cleaned.is_empty() => label.clone(),
                cleaned => cleaned,
            })
            .collect();
        let label_vectors = embed_batched(&embedder, &texts, batch_size).await?;

        let dimension = label_vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(Error::Embedding("backend returned empty vectors".into()));
        }
        check_dimensions(&label_vectors, dimension)?;

        info!(
            "Embedded {} category labels with {} ({} dimensions)",
            labels.len(),
            embedder.model(),
            dimension
        );
        Ok(Self {
            embedder,
            labels: labels.to_vec(),
            label_vectors,
            batch_size,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn dimension(&self) -> usize {
        self.label_vectors.first().map(Vec::len).unwrap_or(0)
    }

    /// Raw cosine similarities (-1..=1), one row per query, one column per label
    pub async fn score_all(&self, queries: &[String]) -> Result<Vec<Vec<f64>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = embed_batched(&self.embedder, queries, self.batch_size).await?;
        check_dimensions(&vectors, self.dimension())?;

        Ok(vectors
            .iter()
            .map(|q| self.label_vectors.iter().map(|l| cosine(q, l)).collect())
            .collect())
    }

    /// Cosine rows mapped to the 0-100 scale
    pub async fn score_queries(&self, queries: &[String]) -> Result<Vec<Vec<f64>>> {
        let matrix = self.score_all(queries).await?;
        Ok(matrix
            .into_iter()
            .map(|row| row.into_iter().map(cosine_to_percent).collect())
            .collect())
    }
}

/// One scorer, selected by configuration
#[derive(Clone)]
pub enum Scorer {
    Lexical(LexicalScorer),
    Semantic(SemanticScorer),
}

impl Scorer {
    /// Lexical scorer over the rulebook's patterns
    pub fn lexical(rulebook: &Rulebook, parallel: bool) -> Self {
        Scorer::Lexical(LexicalScorer::new(rulebook, parallel))
    }

    /// Semantic scorer over the rulebook's category labels
    pub async fn semantic(embedder: Embedder, rulebook: &Rulebook, batch_size: usize) -> Result<Self> {
        Ok(Scorer::Semantic(
            SemanticScorer::new(embedder, rulebook.categories(), batch_size).await?,
        ))
    }

    pub fn kind(&self) -> Strategy {
        match self {
            Scorer::Lexical(_) => Strategy::Lexical,
            Scorer::Semantic(_) => Strategy::Semantic,
        }
    }

    /// Number of score columns per query
    pub fn candidate_count(&self) -> usize {
        match self {
            Scorer::Lexical(s) => s.keys.len(),
            Scorer::Semantic(s) => s.labels.len(),
        }
    }

    /// Score every query against every candidate (0-100)
    ///
    /// Lexical scoring is CPU-bound and runs on the blocking pool.
    pub async fn score_queries(&self, queries: &[String]) -> Result<Vec<Vec<f64>>> {
        debug!("Scoring {} queries ({})", queries.len(), self.kind());
        match self {
            Scorer::Lexical(s) => {
                let scorer = s.clone();
                let queries = queries.to_vec();
                Ok(tokio::task::spawn_blocking(move || scorer.score_queries(&queries)).await?)
            }
            Scorer::Semantic(s) => s.score_queries(queries).await,
        }
    }
}

async fn embed_batched(
    embedder: &Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for (i, batch) in texts.chunks(batch_size).enumerate() {
        debug!("Embedding batch {} ({} texts)", i + 1, batch.len());
        let vectors = embedder.embed(batch).await?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        out.extend(vectors);
    }
    Ok(out)
}

fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(Error::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}

/// Cosine similarity; 0 when either vector has no magnitude
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Map a cosine to the 0-100 scale; negative similarity counts as none
pub fn cosine_to_percent(cos: f64) -> f64 {
    (cos.max(0.0) * 100.0).min(100.0)
}

/// Index and value of the first maximum in a row
pub fn best_index(row: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in row.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best
}
