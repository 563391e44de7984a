//! Rulebook: the ordered pattern → category pairs used as match candidates
//!
//! Rule order matters. It is the tie-break for equal scores, both when
//! picking the best rule and when ranking suggestions.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::engine::UNCATEGORISED;
use crate::error::{Error, Result};
use crate::ledger::{category_labels, Table, COL_CATEGORY, COL_DESCRIPTION};
use crate::normalize::normalize;

/// One rule: a pattern and the category it assigns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Pattern text as written in the rulebook
    pub pattern: String,
    /// Normalized pattern used for matching
    pub key: String,
    pub category: String,
}

/// In-memory rule index, immutable for the run
#[derive(Debug, Clone)]
pub struct Rulebook {
    rules: Vec<Rule>,
    categories: Vec<String>,
    exact: HashMap<String, usize>,
}

impl Rulebook {
    /// Build from (pattern, category) pairs in rulebook order
    ///
    /// Rules whose pattern normalizes to nothing, whose category is blank, or
    /// whose category is the reserved `Uncategorised` label are dropped. When
    /// two patterns normalize to the same key, the first one wins.
    pub fn from_pairs<I, P, C>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut rules: Vec<Rule> = Vec::new();
        let mut exact: HashMap<String, usize> = HashMap::new();
        let mut dropped = 0usize;
        let mut reserved = 0usize;

        for (pattern, category) in pairs {
            let pattern = pattern.as_ref().trim();
            let category = category.as_ref().trim();
            let key = normalize(pattern);

            if key.is_empty() || category.is_empty() {
                dropped += 1;
                continue;
            }
            if is_reserved(category) {
                reserved += 1;
                continue;
            }
            if let Some(&first) = exact.get(&key) {
                debug!(
                    "Duplicate rule '{}' ignored; '{}' already maps to {}",
                    pattern, rules[first].pattern, rules[first].category
                );
                dropped += 1;
                continue;
            }

            exact.insert(key.clone(), rules.len());
            rules.push(Rule {
                pattern: pattern.to_string(),
                key,
                category: category.to_string(),
            });
        }

        if dropped > 0 {
            warn!("Dropped {} empty or duplicate rules", dropped);
        }
        if reserved > 0 {
            warn!(
                "Dropped {} rules mapping to the reserved category {}",
                reserved, UNCATEGORISED
            );
        }
        if rules.is_empty() {
            return Err(Error::EmptyRulebook);
        }

        let mut categories: Vec<String> = Vec::new();
        for rule in &rules {
            if !categories.contains(&rule.category) {
                categories.push(rule.category.clone());
            }
        }

        info!(
            "Loaded {} rules across {} categories",
            rules.len(),
            categories.len()
        );
        Ok(Self {
            rules,
            categories,
            exact,
        })
    }

    /// Category-only rulebook for semantic matching (no pattern text)
    pub fn from_categories<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref().trim();
            if is_reserved(label) {
                warn!("Ignoring reserved category label '{}'", label);
                continue;
            }
            if !label.is_empty() && !categories.iter().any(|c| c == label) {
                categories.push(label.to_string());
            }
        }
        if categories.is_empty() {
            return Err(Error::EmptyRulebook);
        }
        info!("Loaded {} category labels", categories.len());
        Ok(Self {
            rules: Vec::new(),
            categories,
            exact: HashMap::new(),
        })
    }

    /// Build from a table with `Description` and `Category` columns
    pub fn from_table(table: &Table) -> Result<Self> {
        let pattern_col = table.require_column(COL_DESCRIPTION, "rulebook")?;
        let category_col = table.require_column(COL_CATEGORY, "rulebook")?;
        Self::from_pairs(
            table
                .rows()
                .iter()
                .map(|row| (row[pattern_col].as_str(), row[category_col].as_str())),
        )
    }

    /// Build from a table that only needs a `Category` column
    pub fn categories_from_table(table: &Table) -> Result<Self> {
        Self::from_categories(category_labels(table)?)
    }

    /// Load a rulebook file (CSV or workbook sheet)
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self> {
        Self::from_table(&Table::load(path, sheet)?)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Distinct categories in order of first appearance
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the rule whose normalized pattern equals `key`
    pub fn find_exact(&self, key: &str) -> Option<usize> {
        self.exact.get(key).copied()
    }
}

/// `Uncategorised` marks unmatched rows and cannot be assigned by a rule
fn is_reserved(category: &str) -> bool {
    category.trim().eq_ignore_ascii_case(UNCATEGORISED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_normalizes_patterns() {
        let book = Rulebook::from_pairs([("TESCO", "Groceries"), ("Shell Garage", "Transport")]).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.rules()[0].key, "tesco");
        assert_eq!(book.rules()[0].pattern, "TESCO");
        assert_eq!(book.rules()[1].key, "shell garage");
        assert_eq!(book.categories(), &["Groceries", "Transport"]);
    }

    #[test]
    fn test_empty_rulebook_is_error() {
        let pairs: Vec<(&str, &str)> = vec![];
        assert!(matches!(Rulebook::from_pairs(pairs), Err(Error::EmptyRulebook)));
    }

    #[test]
    fn test_blank_rules_dropped() {
        let book = Rulebook::from_pairs([
            ("", "Groceries"),
            ("PAYMENT 12345", "Bills"),
            ("netflix", "  "),
            ("spotify", "Subscriptions"),
        ])
        .unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.rules()[0].category, "Subscriptions");
    }

    #[test]
    fn test_only_blank_rules_is_empty() {
        let result = Rulebook::from_pairs([("REF 99999", "Bills"), ("", "")]);
        assert!(matches!(result, Err(Error::EmptyRulebook)));
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let book = Rulebook::from_pairs([
            ("Tesco", "Groceries"),
            ("TESCO 1234", "Fuel"),
            ("Tesco!", "Other"),
        ])
        .unwrap();
        assert_eq!(book.len(), 1);
        assert_eq!(book.rules()[0].category, "Groceries");
    }

    #[test]
    fn test_categories_distinct_in_first_order() {
        let book = Rulebook::from_pairs([
            ("uber", "Transport"),
            ("tesco", "Groceries"),
            ("shell", "Transport"),
        ])
        .unwrap();
        assert_eq!(book.categories(), &["Transport", "Groceries"]);
    }

    #[test]
    fn test_find_exact() {
        let book = Rulebook::from_pairs([("tesco", "Groceries"), ("shell", "Transport")]).unwrap();
        assert_eq!(book.find_exact("shell"), Some(1));
        assert_eq!(book.find_exact("shell garage"), None);
    }

    #[test]
    fn test_from_table_requires_columns() {
        let table = Table::from_csv_reader("Pattern,Category\ntesco,Groceries\n".as_bytes()).unwrap();
        match Rulebook::from_table(&table) {
            Err(Error::MissingColumn { column, input }) => {
                assert_eq!(column, "Description");
                assert_eq!(input, "rulebook");
            }
            other => panic!("unexpected: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_from_table() {
        let table = Table::from_csv_reader(
            "Description,Category\ntesco,Groceries\nshell,Transport\n".as_bytes(),
        )
        .unwrap();
        let book = Rulebook::from_table(&table).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_from_categories() {
        let book = Rulebook::from_categories(["Groceries", " Transport ", "Groceries", ""]).unwrap();
        assert!(book.is_empty());
        assert_eq!(book.categories(), &["Groceries", "Transport"]);

        let none: [&str; 0] = [];
        assert!(matches!(Rulebook::from_categories(none), Err(Error::EmptyRulebook)));
    }

    #[test]
    fn test_reserved_category_rules_dropped() {
        let book = Rulebook::from_pairs([
            ("atm cash", "Uncategorised"),
            ("cashback", " uncategorised "),
            ("tesco", "Groceries"),
            ("atm cash", "Cash"),
        ])
        .unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.categories(), &["Groceries", "Cash"]);
        assert_eq!(book.rules()[book.find_exact("atm cash").unwrap()].category, "Cash");

        let only_reserved = Rulebook::from_pairs([("atm cash", "Uncategorised")]);
        assert!(matches!(only_reserved, Err(Error::EmptyRulebook)));
    }

    #[test]
    fn test_reserved_category_label_dropped() {
        let book = Rulebook::from_categories(["Groceries", "UNCATEGORISED", "Transport"]).unwrap();
        assert_eq!(book.categories(), &["Groceries", "Transport"]);
        assert!(matches!(
            Rulebook::from_categories(["Uncategorised"]),
            Err(Error::EmptyRulebook)
        ));
    }

    #[test]
    fn test_categories_from_table() {
        let table = Table::from_csv_reader("Category\nDining\nTravel\n".as_bytes()).unwrap();
        let book = Rulebook::categories_from_table(&table).unwrap();
        assert_eq!(book.categories(), &["Dining", "Travel"]);
    }
}
