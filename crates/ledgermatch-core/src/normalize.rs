//! Description normalization
//!
//! Bank descriptions carry a lot of noise that defeats string matching:
//! reference numbers, card suffixes, and boilerplate words like "PAYMENT".
//! `normalize` reduces a raw description to a canonical matching key:
//!
//! 1. Lowercase
//! 2. Drop boilerplate words (`ref`, `payment`, `purchase`, `transaction`,
//!    `debit`, `credit`) and digit runs of four or more (card numbers,
//!    reference codes)
//! 3. Drop everything that is not `a-z`, `0-9` or a space
//! 4. Collapse whitespace and trim
//!
//! Both functions are pure and total: empty or whitespace-only input yields
//! an empty string.

use std::sync::LazyLock;

use regex::Regex;

static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(ref|payment|purchase|transaction|debit|credit)\b")
        .expect("boilerplate pattern is valid")
});

static LONG_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,}\b").expect("digit-run pattern is valid"));

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9 ]").expect("character class pattern is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Normalize a raw transaction description into a matching key
pub fn normalize(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return String::new();
    }

    let text = text.to_lowercase();
    let text = BOILERPLATE.replace_all(&text, "");
    let text = LONG_DIGITS.replace_all(&text, "");
    let text = NON_ALNUM.replace_all(&text, "");
    collapse(&text)
}

/// Light cleanup without boilerplate removal
///
/// Used for category labels, where words like "credit" are meaningful.
pub fn basic(raw: &str) -> String {
    let text = raw.to_lowercase();
    let text = NON_ALNUM.replace_all(&text, "");
    collapse(&text)
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_card_digits() {
        assert_eq!(normalize("TESCO STORE 1234"), "tesco store");
    }

    #[test]
    fn test_normalize_strips_boilerplate_words() {
        assert_eq!(
            normalize("CARD PAYMENT TO SHELL REF 998877"),
            "card to shell"
        );
        assert_eq!(normalize("Direct Debit - Netflix"), "direct netflix");
    }

    #[test]
    fn test_normalize_keeps_short_numbers() {
        assert_eq!(normalize("Pret A Manger 123"), "pret a manger 123");
    }

    #[test]
    fn test_normalize_boilerplate_only_inside_words_is_kept() {
        // "refund" and "creditor" are not whole-word boilerplate
        assert_eq!(normalize("REFUND CREDITOR"), "refund creditor");
    }

    #[test]
    fn test_normalize_punctuation_and_spacing() {
        assert_eq!(normalize("  AMAZON.CO.UK*MK2   MARKETPLACE  "), "amazoncoukmk2 marketplace");
    }

    #[test]
    fn test_normalize_empty_and_whitespace() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
        assert_eq!(normalize("PAYMENT 12345678"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("SAINSBURYS S/MKT 4567 PURCHASE");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_basic_keeps_boilerplate_words() {
        assert_eq!(basic("Credit Card Fees!"), "credit card fees");
        assert_eq!(basic(""), "");
    }
}
