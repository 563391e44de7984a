//! Run summary statistics

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::cache::CacheStats;
use crate::engine::ClassificationResult;
use crate::error::Result;

/// Summary of one categorization run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub categorised: usize,
    pub uncategorised: usize,
    /// Percentage of rows that matched (0-100)
    pub categorisation_rate: f64,
    pub auto_approved: usize,
    /// Mean score over categorised rows
    pub avg_confidence: f64,
    /// Categorised rows at or above the auto-approve threshold
    pub high_confidence: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

impl RunReport {
    pub fn from_results(results: &[ClassificationResult], auto_approve_threshold: f64) -> Self {
        let total = results.len();
        let matched: Vec<&ClassificationResult> =
            results.iter().filter(|r| r.is_categorised()).collect();
        let categorised = matched.len();

        let categorisation_rate = if total == 0 {
            0.0
        } else {
            categorised as f64 / total as f64 * 100.0
        };
        let avg_confidence = if categorised == 0 {
            0.0
        } else {
            matched.iter().map(|r| r.score).sum::<f64>() / categorised as f64
        };

        Self {
            total,
            categorised,
            uncategorised: total - categorised,
            categorisation_rate,
            auto_approved: results.iter().filter(|r| r.auto_approved).count(),
            avg_confidence,
            high_confidence: matched
                .iter()
                .filter(|r| r.score >= auto_approve_threshold)
                .count(),
            cache: None,
        }
    }

    pub fn with_cache_stats(mut self, stats: CacheStats) -> Self {
        self.cache = Some(stats);
        self
    }

    /// Emit the summary through tracing
    pub fn log(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }

    /// Write the report as pretty JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total transactions: {}", self.total)?;
        writeln!(
            f,
            "Categorised: {} ({:.1}%)",
            self.categorised, self.categorisation_rate
        )?;
        writeln!(f, "Uncategorised: {}", self.uncategorised)?;
        writeln!(f, "Auto-approved: {}", self.auto_approved)?;
        writeln!(f, "Average confidence: {:.1}", self.avg_confidence)?;
        write!(f, "High confidence: {}", self.high_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::UNCATEGORISED;

    fn result(category: &str, score: f64, auto: bool) -> ClassificationResult {
        ClassificationResult {
            category: category.to_string(),
            score,
            matched_rule: None,
            auto_approved: auto,
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn test_from_results() {
        let results = vec![
            result("Groceries", 100.0, true),
            result("Transport", 75.0, false),
            result(UNCATEGORISED, 30.0, false),
            result(UNCATEGORISED, 0.0, false),
        ];
        let report = RunReport::from_results(&results, 80.0);
        assert_eq!(report.total, 4);
        assert_eq!(report.categorised, 2);
        assert_eq!(report.uncategorised, 2);
        assert_eq!(report.categorisation_rate, 50.0);
        assert_eq!(report.auto_approved, 1);
        assert_eq!(report.avg_confidence, 87.5);
        assert_eq!(report.high_confidence, 1);
    }

    #[test]
    fn test_empty_run() {
        let report = RunReport::from_results(&[], 80.0);
        assert_eq!(report.total, 0);
        assert_eq!(report.categorisation_rate, 0.0);
        assert_eq!(report.avg_confidence, 0.0);
    }

    #[test]
    fn test_display_and_json() {
        let report = RunReport::from_results(&[result("Dining", 90.0, true)], 80.0);
        let text = report.to_string();
        assert!(text.contains("Categorised: 1 (100.0%)"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total"], 1);
        assert!(value.get("cache").is_none());
    }
}
