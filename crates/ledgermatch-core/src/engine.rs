//! Categorization engine
//!
//! Orchestrates one run: normalize each description, score it against every
//! candidate (through the match cache), pick the best candidate, then apply
//! the threshold and auto-approve policy.
//!
//! Rows are independent. `classify_all` is an order-preserving map over the
//! ledger; the only shared state is the read-only rulebook/scorer and the
//! cache.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheStats, MatchCache};
use crate::config::{EngineConfig, Strategy};
use crate::error::{Error, Result};
use crate::ledger::format_score;
use crate::normalize::normalize;
use crate::rules::Rulebook;
use crate::scorer::{best_index, Scorer};

/// Category assigned when no candidate clears the match threshold
pub const UNCATEGORISED: &str = "Uncategorised";

/// An alternative category offered for an unmatched row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub category: String,
    pub score: f64,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}%)", self.category, format_score(self.score))
    }
}

/// Outcome for one transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub category: String,
    /// Best candidate score (0-100)
    pub score: f64,
    /// Winning rule pattern (lexical strategy, matched rows only)
    pub matched_rule: Option<String>,
    pub auto_approved: bool,
    /// Ranked alternatives; only populated for uncategorised rows
    pub suggestions: Vec<Suggestion>,
}

impl ClassificationResult {
    /// Result for a row with nothing to match on
    pub fn empty() -> Self {
        Self {
            category: UNCATEGORISED.to_string(),
            score: 0.0,
            matched_rule: None,
            auto_approved: false,
            suggestions: Vec::new(),
        }
    }

    pub fn is_categorised(&self) -> bool {
        self.category != UNCATEGORISED
    }
}

/// One candidate and its score, for inspecting how a description ranks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub category: String,
    /// Rule pattern (lexical strategy only)
    pub rule: Option<String>,
    pub score: f64,
}

/// The matching engine for a single run
pub struct Categorizer {
    config: EngineConfig,
    rulebook: Rulebook,
    scorer: Scorer,
    cache: MatchCache<String, Arc<Vec<f64>>>,
}

impl Categorizer {
    /// Validate configuration and assemble the engine
    ///
    /// Fails before any row is processed if the thresholds are inverted, the
    /// rulebook has no candidates, or the scorer does not fit the rulebook.
    pub fn new(config: EngineConfig, rulebook: Rulebook, scorer: Scorer) -> Result<Self> {
        config.validate()?;

        let expected = match scorer.kind() {
            Strategy::Lexical => rulebook.len(),
            Strategy::Semantic => rulebook.categories().len(),
        };
        if expected == 0 {
            return Err(Error::EmptyRulebook);
        }
        if scorer.kind() != config.strategy {
            return Err(Error::Config(format!(
                "Scorer strategy {} does not match configured strategy {}",
                scorer.kind(),
                config.strategy
            )));
        }
        if scorer.candidate_count() != expected {
            return Err(Error::Config(format!(
                "Scorer has {} candidates but the rulebook provides {}",
                scorer.candidate_count(),
                expected
            )));
        }

        let cache = MatchCache::new(config.cache_size);
        Ok(Self {
            config,
            rulebook,
            scorer,
            cache,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    pub fn strategy(&self) -> Strategy {
        self.scorer.kind()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Classify a single description
    pub async fn classify(&self, description: &str) -> Result<ClassificationResult> {
        let mut results = self.classify_chunk(&[description.to_string()]).await?;
        Ok(results.pop().unwrap_or_else(ClassificationResult::empty))
    }

    /// Classify every description, preserving input order
    pub async fn classify_all(&self, descriptions: &[String]) -> Result<Vec<ClassificationResult>> {
        let start = Instant::now();
        let total = descriptions.len();
        let mut results = Vec::with_capacity(total);

        info!(
            "Categorizing {} transactions ({} strategy, threshold {})",
            total, self.config.strategy, self.config.match_threshold
        );

        for chunk in descriptions.chunks(self.config.chunk_size) {
            results.extend(self.classify_chunk(chunk).await?);
            info!("Processed {}/{} transactions", results.len(), total);
        }

        let stats = self.cache.stats();
        info!(
            "Cache: {} hits, {} misses ({:.1}% hit rate), {} evictions",
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0,
            stats.evictions
        );
        info!("Categorization finished in {:.2?}", start.elapsed());
        Ok(results)
    }

    /// Every candidate's score for one description, best first
    pub async fn rank(&self, description: &str) -> Result<Vec<RankedCandidate>> {
        let key = normalize(description);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let scores = self.scores_for(std::slice::from_ref(&key)).await?;
        let Some(Some(row)) = scores.into_iter().next() else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<RankedCandidate> = row
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let (category, rule) = self.candidate(i);
                RankedCandidate {
                    category: category.to_string(),
                    rule: rule.map(str::to_string),
                    score,
                }
            })
            .collect();
        // Stable: equal scores stay in rulebook order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    async fn classify_chunk(&self, chunk: &[String]) -> Result<Vec<ClassificationResult>> {
        let keys: Vec<String> = if self.config.parallel {
            let chunk = chunk.to_vec();
            tokio::task::spawn_blocking(move || {
                chunk.par_iter().map(|d| normalize(d)).collect::<Vec<_>>()
            })
            .await?
        } else {
            chunk.iter().map(|d| normalize(d)).collect()
        };
        let scores = self.scores_for(&keys).await?;

        Ok(keys
            .iter()
            .zip(scores)
            .map(|(key, row)| match row {
                Some(row) => self.decide(key, &row),
                None => ClassificationResult::empty(),
            })
            .collect())
    }

    /// Score rows for each key, from the cache where possible
    ///
    /// Distinct uncached keys are scored together in one scorer call. Empty
    /// keys get `None`.
    async fn scores_for(&self, keys: &[String]) -> Result<Vec<Option<Arc<Vec<f64>>>>> {
        let mut resolved: HashMap<&str, Arc<Vec<f64>>> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut pending: Vec<&str> = Vec::new();

        for key in keys.iter().filter(|k| !k.is_empty()) {
            if !seen.insert(key.as_str()) {
                continue;
            }
            match self.cache.get(key) {
                Some(row) => {
                    resolved.insert(key.as_str(), row);
                }
                None => pending.push(key.as_str()),
            }
        }

        if !pending.is_empty() {
            debug!(
                "{} distinct descriptions to score, {} from cache",
                pending.len(),
                resolved.len()
            );
            let queries: Vec<String> = pending.iter().map(|k| k.to_string()).collect();
            let rows = self.scorer.score_queries(&queries).await?;
            if rows.len() != queries.len() {
                return Err(Error::InvalidData(format!(
                    "scorer returned {} rows for {} queries",
                    rows.len(),
                    queries.len()
                )));
            }
            for (key, row) in pending.into_iter().zip(rows) {
                let row = Arc::new(row);
                self.cache.insert(key.to_string(), Arc::clone(&row));
                resolved.insert(key, row);
            }
        }

        Ok(keys
            .iter()
            .map(|key| resolved.get(key.as_str()).cloned())
            .collect())
    }

    /// Category and rule text for candidate column `index`
    fn candidate(&self, index: usize) -> (&str, Option<&str>) {
        match self.scorer.kind() {
            Strategy::Lexical => {
                let rule = &self.rulebook.rules()[index];
                (rule.category.as_str(), Some(rule.pattern.as_str()))
            }
            Strategy::Semantic => (self.rulebook.categories()[index].as_str(), None),
        }
    }

    fn decide(&self, key: &str, scores: &[f64]) -> ClassificationResult {
        let exact = match self.scorer.kind() {
            Strategy::Lexical => self.rulebook.find_exact(key).map(|i| (i, 100.0)),
            Strategy::Semantic => None,
        };
        let Some((index, best)) = exact.or_else(|| best_index(scores)) else {
            return ClassificationResult::empty();
        };
        let best = best.clamp(0.0, 100.0);

        if best >= self.config.match_threshold {
            let (category, rule) = self.candidate(index);
            ClassificationResult {
                category: category.to_string(),
                score: best,
                matched_rule: rule.map(str::to_string),
                auto_approved: best >= self.config.auto_approve_threshold,
                suggestions: Vec::new(),
            }
        } else {
            ClassificationResult {
                category: UNCATEGORISED.to_string(),
                score: best,
                matched_rule: None,
                auto_approved: false,
                suggestions: self.suggestions(scores),
            }
        }
    }

    /// Top distinct categories by score
    ///
    /// Each category takes its best candidate's score. Equal scores keep the
    /// order in which categories first appear in the rulebook.
    fn suggestions(&self, scores: &[f64]) -> Vec<Suggestion> {
        if self.config.num_suggestions == 0 {
            return Vec::new();
        }

        let mut by_category: Vec<Suggestion> = Vec::new();
        let mut slot: HashMap<&str, usize> = HashMap::new();
        for (i, &score) in scores.iter().enumerate() {
            let (category, _) = self.candidate(i);
            match slot.get(category) {
                Some(&s) => {
                    if score > by_category[s].score {
                        by_category[s].score = score;
                    }
                }
                None => {
                    slot.insert(category, by_category.len());
                    by_category.push(Suggestion {
                        category: category.to_string(),
                        score,
                    });
                }
            }
        }

        by_category.retain(|s| s.score > self.config.suggestion_min_score);
        by_category.sort_by(|a, b| b.score.total_cmp(&a.score));
        by_category.truncate(self.config.num_suggestions);
        by_category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{Embedder, MockEmbedder};

    fn rulebook() -> Rulebook {
        Rulebook::from_pairs([("tesco", "Groceries"), ("shell", "Transport")]).unwrap()
    }

    fn lexical(config: EngineConfig, book: Rulebook) -> Categorizer {
        let scorer = Scorer::lexical(&book, config.parallel);
        Categorizer::new(config, book, scorer).unwrap()
    }

    fn default_engine() -> Categorizer {
        lexical(EngineConfig::default(), rulebook())
    }

    fn sample_ledger() -> Vec<String> {
        [
            "TESCO STORE 1234",
            "SHELL GARAGE M4",
            "UNKNOWN MERCHANT XYZ",
            "Sainsbury Local",
            "",
            "tesco store 9999",
            "Starbuck Coffee",
            "NETFLX",
            "PAYMENT REF 123456",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn richer_rulebook() -> Rulebook {
        Rulebook::from_pairs([
            ("tesco", "Groceries"),
            ("sainsburys", "Groceries"),
            ("shell", "Transport"),
            ("starbucks", "Dining"),
            ("netflix", "Subscriptions"),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_scenario_a_match() {
        let engine = default_engine();
        let result = engine.classify("TESCO STORE 1234").await.unwrap();
        assert_eq!(result.category, "Groceries");
        assert!(result.score >= 70.0);
        assert_eq!(result.matched_rule.as_deref(), Some("tesco"));
        assert!(result.auto_approved);
        assert!(result.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_b_uncategorised_with_suggestions() {
        let engine = default_engine();
        let result = engine.classify("UNKNOWN MERCHANT XYZ").await.unwrap();
        assert_eq!(result.category, UNCATEGORISED);
        assert!(result.score < 70.0);
        assert!(!result.auto_approved);
        assert_eq!(result.matched_rule, None);
        assert_eq!(result.suggestions.len(), 2);
        assert_eq!(result.suggestions[0].category, "Groceries");
        assert_eq!(result.suggestions[1].category, "Transport");
        assert!(result.suggestions[0].score > result.suggestions[1].score);
        assert_eq!(result.suggestions[0].to_string(), "Groceries (30.4%)");
    }

    #[test]
    fn test_scenario_c_empty_rulebook() {
        let pairs: Vec<(&str, &str)> = Vec::new();
        assert!(matches!(
            Rulebook::from_pairs(pairs),
            Err(Error::EmptyRulebook)
        ));

        // A category-only book has no rules for the lexical scorer
        let book = Rulebook::from_categories(["Groceries"]).unwrap();
        let scorer = Scorer::lexical(&book, false);
        assert!(matches!(
            Categorizer::new(EngineConfig::default(), book, scorer),
            Err(Error::EmptyRulebook)
        ));
    }

    #[tokio::test]
    async fn test_scenario_d_matched_but_not_auto_approved() {
        let config = EngineConfig {
            match_threshold: 70.0,
            auto_approve_threshold: 95.0,
            ..Default::default()
        };
        let book = Rulebook::from_pairs([("sainsburys", "Groceries")]).unwrap();
        let engine = lexical(config, book);

        let result = engine.classify("SAINSBURY LOCAL").await.unwrap();
        assert_eq!(result.category, "Groceries");
        assert!(result.score >= 70.0 && result.score < 95.0, "score {}", result.score);
        assert!(!result.auto_approved);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = EngineConfig {
            match_threshold: 90.0,
            auto_approve_threshold: 80.0,
            ..Default::default()
        };
        let book = rulebook();
        let scorer = Scorer::lexical(&book, false);
        assert!(matches!(
            Categorizer::new(config, book, scorer),
            Err(Error::InvalidThresholds { .. })
        ));
    }

    #[tokio::test]
    async fn test_strategy_mismatch_rejected() {
        let book = rulebook();
        let scorer = Scorer::semantic(Embedder::mock(), &book, 8).await.unwrap();
        assert!(matches!(
            Categorizer::new(EngineConfig::default(), book, scorer),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_description() {
        let engine = default_engine();
        for text in ["", "   ", "REF 12345678"] {
            let result = engine.classify(text).await.unwrap();
            assert_eq!(result, ClassificationResult::empty());
        }
    }

    #[tokio::test]
    async fn test_exact_match_wins_over_earlier_tie() {
        // "tesco" already scores 100 against "tesco store"; the exact rule wins
        let book = Rulebook::from_pairs([("tesco", "Groceries"), ("tesco store", "Household")]).unwrap();
        let engine = lexical(EngineConfig::default(), book);
        let result = engine.classify("Tesco Store").await.unwrap();
        assert_eq!(result.category, "Household");
        assert_eq!(result.score, 100.0);
        assert_eq!(result.matched_rule.as_deref(), Some("tesco store"));
    }

    #[tokio::test]
    async fn test_tie_break_first_rule() {
        let book = Rulebook::from_pairs([("shell", "Transport"), ("garage", "Motoring")]).unwrap();
        let engine = lexical(EngineConfig::default(), book);
        let result = engine.classify("shell garage").await.unwrap();
        assert_eq!(result.score, 100.0);
        assert_eq!(result.category, "Transport");
    }

    #[tokio::test]
    async fn test_determinism_and_parallel_equivalence() {
        let ledger = sample_ledger();
        let sequential = lexical(
            EngineConfig {
                parallel: false,
                chunk_size: 2,
                ..Default::default()
            },
            richer_rulebook(),
        );
        let parallel = lexical(EngineConfig::default(), richer_rulebook());

        let a = sequential.classify_all(&ledger).await.unwrap();
        let b = parallel.classify_all(&ledger).await.unwrap();
        let c = parallel.classify_all(&ledger).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.len(), ledger.len());
    }

    #[tokio::test]
    async fn test_threshold_monotonicity() {
        let ledger = sample_ledger();
        let mut last_matched = usize::MAX;
        let mut last_auto = usize::MAX;

        for threshold in [50.0, 60.0, 70.0, 80.0, 90.0, 100.0] {
            let engine = lexical(
                EngineConfig {
                    match_threshold: threshold,
                    auto_approve_threshold: threshold,
                    ..Default::default()
                },
                richer_rulebook(),
            );
            let results = engine.classify_all(&ledger).await.unwrap();
            let matched = results.iter().filter(|r| r.is_categorised()).count();
            let auto = results.iter().filter(|r| r.auto_approved).count();
            assert!(matched <= last_matched);
            assert!(auto <= last_auto);
            last_matched = matched;
            last_auto = auto;
        }
    }

    #[tokio::test]
    async fn test_result_invariants() {
        let config = EngineConfig {
            num_suggestions: 2,
            ..Default::default()
        };
        let engine = lexical(config.clone(), richer_rulebook());
        let results = engine.classify_all(&sample_ledger()).await.unwrap();

        for r in &results {
            assert!((0.0..=100.0).contains(&r.score));
            assert_eq!(r.category == UNCATEGORISED, r.score < config.match_threshold);
            assert_eq!(r.auto_approved, r.score >= config.auto_approve_threshold);
            if r.is_categorised() {
                assert!(r.suggestions.is_empty());
                assert!(r.matched_rule.is_some());
            } else {
                assert!(r.suggestions.len() <= 2);
                let cats: HashSet<&str> = r.suggestions.iter().map(|s| s.category.as_str()).collect();
                assert_eq!(cats.len(), r.suggestions.len());
                assert!(r
                    .suggestions
                    .windows(2)
                    .all(|w| w[0].score >= w[1].score));
            }
        }
    }

    #[tokio::test]
    async fn test_reserved_category_never_assigned_by_a_rule() {
        let book = Rulebook::from_pairs([("atm cash", UNCATEGORISED), ("tesco", "Groceries")]).unwrap();
        let config = EngineConfig::default();
        let engine = lexical(config.clone(), book);

        let result = engine.classify("ATM CASH 123456").await.unwrap();
        assert_eq!(result.category, UNCATEGORISED);
        assert!(result.score < config.match_threshold);
        assert_eq!(result.matched_rule, None);
        assert!(!result.auto_approved);

        let report = crate::report::RunReport::from_results(&[result], config.auto_approve_threshold);
        assert_eq!((report.categorised, report.auto_approved), (0, 0));
    }

    #[tokio::test]
    async fn test_suggestions_distinct_categories() {
        let book = Rulebook::from_pairs([
            ("tesco", "Groceries"),
            ("tesco extra", "Groceries"),
            ("shell", "Transport"),
        ])
        .unwrap();
        let engine = lexical(EngineConfig::default(), book);
        let result = engine.classify("unknown merchant xyz").await.unwrap();
        assert_eq!(result.category, UNCATEGORISED);
        let cats: Vec<&str> = result.suggestions.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(cats, vec!["Groceries", "Transport"]);
    }

    #[tokio::test]
    async fn test_suggestion_limits() {
        let none = lexical(
            EngineConfig {
                num_suggestions: 0,
                ..Default::default()
            },
            rulebook(),
        );
        let result = none.classify("unknown merchant xyz").await.unwrap();
        assert!(result.suggestions.is_empty());

        let strict = lexical(
            EngineConfig {
                suggestion_min_score: 20.0,
                ..Default::default()
            },
            rulebook(),
        );
        let result = strict.classify("unknown merchant xyz").await.unwrap();
        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].category, "Groceries");
    }

    #[tokio::test]
    async fn test_cache_hits_for_repeated_descriptions() {
        let engine = default_engine();
        engine.classify("TESCO STORE 1234").await.unwrap();
        let stats = engine.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (0, 1, 1));

        // Normalizes to the same key
        engine.classify("Tesco Store 5678").await.unwrap();
        let stats = engine.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_cache_bounded() {
        let engine = lexical(
            EngineConfig {
                cache_size: 2,
                ..Default::default()
            },
            rulebook(),
        );
        let ledger: Vec<String> = ["tesco", "shell", "asda", "uber", "tesco"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let results = engine.classify_all(&ledger).await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0], results[4]);
        assert!(engine.cache_stats().len <= 2);
    }

    #[tokio::test]
    async fn test_rank() {
        let engine = lexical(EngineConfig::default(), richer_rulebook());
        let ranked = engine.rank("TESCO STORE 1234").await.unwrap();
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].category, "Groceries");
        assert_eq!(ranked[0].rule.as_deref(), Some("tesco"));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(engine.rank("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_semantic_engine() {
        let config = EngineConfig {
            strategy: Strategy::Semantic,
            match_threshold: 40.0,
            auto_approve_threshold: 90.0,
            ..Default::default()
        };
        let book = Rulebook::from_categories(["Groceries", "Transport", "Subscriptions"]).unwrap();
        let scorer = Scorer::semantic(Embedder::mock(), &book, 2).await.unwrap();
        let engine = Categorizer::new(config, book, scorer).unwrap();

        let ledger: Vec<String> = ["TESCO STORE 1234", "UBER TRIP", "NETFLIX UK", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let results = engine.classify_all(&ledger).await.unwrap();
        assert_eq!(results[0].category, "Groceries");
        assert_eq!(results[1].category, "Transport");
        assert_eq!(results[2].category, "Subscriptions");
        assert_eq!(results[3], ClassificationResult::empty());
        for r in &results[..3] {
            assert_eq!(r.matched_rule, None);
            assert!(!r.auto_approved);
        }
    }

    #[tokio::test]
    async fn test_semantic_backend_failure_is_fatal() {
        let config = EngineConfig {
            strategy: Strategy::Semantic,
            ..Default::default()
        };
        let book = Rulebook::from_categories(["Groceries"]).unwrap();
        let scorer = Scorer::semantic(Embedder::mock(), &book, 2).await.unwrap();
        let engine = Categorizer::new(config, book, scorer).unwrap();
        assert!(engine.classify("tesco").await.is_ok());

        let book = Rulebook::from_categories(["Groceries"]).unwrap();
        let failing = Scorer::semantic(Embedder::Mock(MockEmbedder::unhealthy()), &book, 2).await;
        assert!(failing.is_err());
    }
}
