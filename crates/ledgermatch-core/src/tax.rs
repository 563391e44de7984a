//! Directional merchant prefixes for tax bookkeeping
//!
//! Some merchants show up on both sides of a statement: the purchase and,
//! later, its refund. With tax rules enabled, a row matched by one of these
//! directional rules is split on the sign of its value:
//!
//! - value < 0: `Expense: <category>`
//! - value >= 0: `Refund: <category>`, or `Income: <category>` when the rule
//!   is also listed as a refund edge case
//!
//! Prefixes are applied when results are written out. Auto-approval and the
//! run report see the base category.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::config::TaxRulesConfig;
use crate::engine::ClassificationResult;
use crate::error::{Error, Result};
use crate::ledger::{Table, COL_DESCRIPTION};
use crate::normalize::normalize;

/// Key column in directional and edge-case lists
pub const COL_DESCRIPTION_CLEAN: &str = "description_clean";

pub const EXPENSE_PREFIX: &str = "Expense";
pub const REFUND_PREFIX: &str = "Refund";
pub const INCOME_PREFIX: &str = "Income";

/// Directional merchant and refund edge-case rule keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxRules {
    directional: HashSet<String>,
    edge_cases: HashSet<String>,
}

impl TaxRules {
    /// Build from rule patterns; entries are normalized like rulebook keys
    pub fn new<I, J, S, T>(directional: I, edge_cases: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            directional: keys(directional),
            edge_cases: keys(edge_cases),
        }
    }

    /// Load the lists named in the config; `None` when tax rules are off
    pub fn from_config(config: &TaxRulesConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let directional = config.directional_file.as_deref().ok_or_else(|| {
            Error::Config("tax_rules.enabled requires tax_rules.directional_file".into())
        })?;
        Self::load(directional, config.edge_cases_file.as_deref()).map(Some)
    }

    /// Read the directional list and, optionally, the edge-case list
    pub fn load(directional: &Path, edge_cases: Option<&Path>) -> Result<Self> {
        let directional = read_keys(directional, "directional merchants")?;
        let edge_cases = match edge_cases {
            Some(path) => read_keys(path, "refund edge cases")?,
            None => Vec::new(),
        };
        let rules = Self::new(directional, edge_cases);
        info!(
            "Loaded {} directional merchants, {} refund edge cases",
            rules.directional.len(),
            rules.edge_cases.len()
        );
        Ok(rules)
    }

    pub fn is_directional(&self, rule: &str) -> bool {
        self.directional.contains(&normalize(rule))
    }

    pub fn is_edge_case(&self, rule: &str) -> bool {
        self.edge_cases.contains(&normalize(rule))
    }

    /// Output category for a result given the row's signed value
    pub fn category_for(&self, result: &ClassificationResult, value: f64) -> String {
        let Some(rule) = result.matched_rule.as_deref() else {
            return result.category.clone();
        };
        if !self.is_directional(rule) {
            return result.category.clone();
        }

        let prefix = if value < 0.0 {
            EXPENSE_PREFIX
        } else if self.is_edge_case(rule) {
            INCOME_PREFIX
        } else {
            REFUND_PREFIX
        };
        format!("{}: {}", prefix, result.category)
    }
}

fn keys<I, S>(entries: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|e| normalize(e.as_ref()))
        .filter(|k| !k.is_empty())
        .collect()
}

fn read_keys(path: &Path, input: &str) -> Result<Vec<String>> {
    let table = Table::load(path, None)?;
    let index = table
        .column_index(COL_DESCRIPTION_CLEAN)
        .or_else(|| table.column_index(COL_DESCRIPTION))
        .ok_or_else(|| Error::missing_column(COL_DESCRIPTION_CLEAN, input))?;
    Ok(table.column(index).map(str::to_string).collect())
}
