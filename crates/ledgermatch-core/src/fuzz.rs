//! Lexical similarity measures
//!
//! RapidFuzz-compatible scorers on a 0-100 scale:
//!
//! - `ratio`: Indel-normalized similarity (`2 * LCS / (len_a + len_b)`)
//! - `partial_ratio`: best `ratio` of the shorter string against any
//!   same-length window of the longer one
//! - `token_set_ratio`: word-set comparison, insensitive to order and
//!   duplicate tokens
//! - `hybrid_score`: `0.6 * token_set_ratio + 0.4 * partial_ratio`, the score
//!   used to rank rules
//!
//! All measures operate on `char`s, so multi-byte input never splits a
//! code point.

use std::collections::BTreeSet;

/// Weight of the token-set measure in `hybrid_score`
pub const TOKEN_SET_WEIGHT: f64 = 0.6;

/// Weight of the partial measure in `hybrid_score`
pub const PARTIAL_WEIGHT: f64 = 0.4;

/// Length of the longest common subsequence of two char slices
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Single rolling row over the shorter input
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; inner.len() + 1];
    for &oc in outer {
        let mut diag = 0;
        for (j, &ic) in inner.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if oc == ic {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    row[inner.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    100.0 * (2 * lcs_len(a, b)) as f64 / total as f64
}

/// Indel-normalized similarity between two strings (0-100)
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best alignment of the shorter string inside the longer one (0-100)
///
/// Windows are clipped at both ends of the longer string, so a shorter string
/// that overhangs the start or end still gets partial credit.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return if a.is_empty() && b.is_empty() { 100.0 } else { 0.0 };
    }

    if a.len() == b.len() {
        return partial_aligned(&a, &b).max(partial_aligned(&b, &a));
    }
    if a.len() < b.len() {
        partial_aligned(&a, &b)
    } else {
        partial_aligned(&b, &a)
    }
}

fn partial_aligned(short: &[char], long: &[char]) -> f64 {
    let n = short.len();
    let mut best = 0.0f64;

    // Full-length windows
    for start in 0..=(long.len() - n) {
        let window = &long[start..start + n];
        if window == short {
            return 100.0;
        }
        best = best.max(ratio_chars(short, window));
    }

    // Clipped windows at the head and tail
    for len in 1..n {
        best = best.max(ratio_chars(short, &long[..len]));
        best = best.max(ratio_chars(short, &long[long.len() - len..]));
    }

    best
}

/// Word-set similarity (0-100)
///
/// Tokens are whitespace separated and compared as sorted sets. Returns 100
/// when the strings share at least one token and one token set contains the
/// other.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect = intersection.join(" ");
    let combine = |diff: &[&str]| {
        let rest = diff.join(" ");
        if sect.is_empty() {
            rest
        } else {
            format!("{} {}", sect, rest)
        }
    };
    let combined_ab = combine(&diff_ab);
    let combined_ba = combine(&diff_ba);

    let mut best = ratio(&combined_ab, &combined_ba);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_ab))
            .max(ratio(&sect, &combined_ba));
    }
    best
}

/// Weighted blend of word-set agreement and substring containment (0-100)
///
/// Empty input on either side scores 0.
pub fn hybrid_score(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let score = TOKEN_SET_WEIGHT * token_set_ratio(a, b) + PARTIAL_WEIGHT * partial_ratio(a, b);
    score.clamp(0.0, 100.0)
}
