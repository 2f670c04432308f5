//! Duplicate scoring - token overlap plus sequence similarity.
//!
//! One composite score serves two callers: the write gate (reject
//! near-duplicates in the same scope) and the consolidation reviewer
//! (surface merge candidates for an operator).
//!
//! The write gate rejects when EITHER the composite score exceeds the
//! similarity threshold OR the bare token overlap exceeds its own, lower
//! threshold. The OR is deliberate: token overlap catches paraphrases
//! that a strict sequence metric misses.

use crate::constants::{
    DEDUP_CONTAINMENT_BONUS, DEDUP_CONTAINMENT_CHARS_MIN, DEDUP_WEIGHT_SEQUENCE_RATIO,
    DEDUP_WEIGHT_TOKEN_OVERLAP,
};
use std::collections::HashSet;

/// Similarity breakdown between two texts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScore {
    /// Symmetric token-set overlap in [0, 1]
    pub token_overlap: f64,
    /// Ratcliff/Obershelp-style sequence ratio in [0, 1]
    pub sequence_ratio: f64,
    /// Weighted composite, containment bonus applied, clamped to [0, 1]
    pub composite: f64,
}

impl SimilarityScore {
    /// Whether this pair trips either duplicate threshold.
    #[must_use]
    pub fn is_duplicate(&self, similarity_threshold: f64, token_overlap_threshold: f64) -> bool {
        self.composite >= similarity_threshold || self.token_overlap >= token_overlap_threshold
    }
}

/// Score two texts for near-duplication.
#[must_use]
pub fn score_pair(a: &str, b: &str) -> SimilarityScore {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    let token_overlap = token_overlap(&a_lower, &b_lower);
    let sequence_ratio = sequence_ratio(&a_lower, &b_lower);

    let mut composite =
        DEDUP_WEIGHT_TOKEN_OVERLAP * token_overlap + DEDUP_WEIGHT_SEQUENCE_RATIO * sequence_ratio;

    // Literal containment is strong evidence even when token sets diverge.
    let min_len = a_lower.len().min(b_lower.len());
    if min_len >= DEDUP_CONTAINMENT_CHARS_MIN
        && (a_lower.contains(&b_lower) || b_lower.contains(&a_lower))
    {
        composite += DEDUP_CONTAINMENT_BONUS;
    }

    SimilarityScore {
        token_overlap,
        sequence_ratio,
        composite: composite.clamp(0.0, 1.0),
    }
}

/// Symmetric token-set overlap: the larger of the two directional
/// containment ratios, so a short text fully inside a long one scores high.
fn token_overlap(a_lower: &str, b_lower: &str) -> f64 {
    let a_tokens = tokenize(a_lower);
    let b_tokens = tokenize(b_lower);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let shared = a_tokens.intersection(&b_tokens).count() as f64;
    #[allow(clippy::cast_precision_loss)]
    let ratio_a = shared / a_tokens.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let ratio_b = shared / b_tokens.len() as f64;
    ratio_a.max(ratio_b)
}

fn tokenize(lower: &str) -> HashSet<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Ratcliff/Obershelp sequence ratio: 2M / (|a| + |b|) where M is the
/// total length of matching blocks found by recursively taking the
/// longest common substring and matching the pieces on either side.
#[must_use]
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let matched = matching_chars(&a_chars, &b_chars);

    #[allow(clippy::cast_precision_loss)]
    let ratio = 2.0 * matched as f64 / (a_chars.len() + b_chars.len()) as f64;
    ratio
}

/// Total matched characters via iterative longest-common-substring
/// decomposition (explicit work stack instead of recursion).
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut stack = vec![((0, a.len()), (0, b.len()))];

    while let Some(((a_lo, a_hi), (b_lo, b_hi))) = stack.pop() {
        let (a_start, b_start, size) = longest_common_block(a, a_lo, a_hi, b, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        total += size;
        stack.push(((a_lo, a_start), (b_lo, b_start)));
        stack.push(((a_start + size, a_hi), (b_start + size, b_hi)));
    }

    total
}

/// Longest common block within the given windows, earliest-in-`a` on ties.
fn longest_common_block(
    a: &[char],
    a_lo: usize,
    a_hi: usize,
    b: &[char],
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_a, mut best_b, mut best_len) = (a_lo, b_lo, 0);
    if a_lo >= a_hi || b_lo >= b_hi {
        return (best_a, best_b, best_len);
    }

    // lengths[j] = match length ending at (i-1, j-1) from the prior row
    let width = b_hi - b_lo;
    let mut prev = vec![0usize; width + 1];
    for i in a_lo..a_hi {
        let mut row = vec![0usize; width + 1];
        for (jj, j) in (b_lo..b_hi).enumerate() {
            if a[i] == b[j] {
                let len = prev[jj] + 1;
                row[jj + 1] = len;
                if len > best_len {
                    best_len = len;
                    best_a = i + 1 - len;
                    best_b = j + 1 - len;
                }
            }
        }
        prev = row;
    }

    (best_a, best_b, best_len)
}

// =============================================================================
// Tests
// =============================================================================
