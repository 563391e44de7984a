//! Mock embedder for testing
//!
//! Produces deterministic, L2-normalized vectors without a model server.
//! Character trigrams are hashed into buckets so similar spellings land
//! close together. A small merchant vocabulary also feeds dedicated concept
//! dimensions, so "tesco" sits near "groceries" the way a real model would
//! place them.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::EmbeddingBackend;

/// Default vector width
pub const MOCK_DIMENSION: usize = 256;

/// Weight of a concept hit relative to a single trigram
const CONCEPT_WEIGHT: f32 = 4.0;

/// Words that pull a text toward a concept dimension
const CONCEPTS: &[(&str, &[&str])] = &[
    (
        "groceries",
        &[
            "groceries", "grocery", "supermarket", "tesco", "sainsbury", "sainsburys", "asda",
            "aldi", "lidl", "waitrose", "morrisons",
        ],
    ),
    (
        "transport",
        &[
            "transport", "travel", "fuel", "petrol", "shell", "bp", "esso", "uber", "taxi",
            "train", "rail", "bus", "parking",
        ],
    ),
    (
        "subscriptions",
        &[
            "subscriptions", "subscription", "netflix", "spotify", "disney", "prime", "streaming",
        ],
    ),
    (
        "dining",
        &[
            "dining", "restaurant", "cafe", "coffee", "starbucks", "costa", "pret", "mcdonalds",
            "takeaway",
        ],
    ),
    (
        "utilities",
        &[
            "utilities", "utility", "electric", "electricity", "gas", "water", "broadband",
            "energy",
        ],
    ),
];

#[derive(Clone, Debug)]
pub struct MockEmbedder {
    /// Whether health_check should return true
    pub healthy: bool,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    /// Create a new mock embedder (healthy by default)
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// Create an unhealthy mock embedder; every request fails
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }

    /// Embed one text synchronously
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; MOCK_DIMENSION];
        let lowered = text.to_lowercase();
        let buckets = MOCK_DIMENSION - CONCEPTS.len();

        let padded: Vec<char> = format!(" {} ", lowered.trim()).chars().collect();
        if padded.len() >= 3 {
            for gram in padded.windows(3) {
                let idx = CONCEPTS.len() + (fnv1a(gram) % buckets as u64) as usize;
                v[idx] += 1.0;
            }
        }

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            for (slot, (_, words)) in CONCEPTS.iter().enumerate() {
                if words.contains(&word) {
                    v[slot] += CONCEPT_WEIGHT;
                }
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for c in chars {
        for byte in (*c as u32).to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
    }
    hash
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if !self.healthy {
            return Err(Error::Embedding("mock embedder is unavailable".into()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let m = MockEmbedder::new();
        let a = m.vector("tesco store");
        let b = m.vector("tesco store");
        assert_eq!(a, b);
        assert_eq!(a.len(), MOCK_DIMENSION);
        let norm = dot(&a, &a).sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let m = MockEmbedder::new();
        assert!(m.vector("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_concepts_pull_merchants_to_labels() {
        let m = MockEmbedder::new();
        let tesco = m.vector("tesco store");
        let groceries = m.vector("Groceries");
        let transport = m.vector("Transport");
        assert!(dot(&tesco, &groceries) > dot(&tesco, &transport));
        assert!(dot(&tesco, &groceries) > 0.4);

        let shell = m.vector("shell garage");
        assert!(dot(&shell, &transport) > dot(&shell, &groceries));
    }

    #[tokio::test]
    async fn test_unhealthy_fails() {
        let m = MockEmbedder::unhealthy();
        assert!(!m.health_check().await);
        assert!(m.embed(&["x".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_embed_batch_order() {
        let m = MockEmbedder::new();
        let texts = vec!["netflix".to_string(), "uber".to_string()];
        let out = m.embed(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], m.vector("netflix"));
        assert_eq!(out[1].len(), MOCK_DIMENSION);
    }
}
