//! Proximity strategies for ResoRank
//!
//! Segment masks split a document into at most 32 positional buckets; bit `i`
//! is set when the term occurs in bucket `i`. All functions here are pure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::math::pop_count;
use crate::types::TermWithIdf;

// =============================================================================
// Proximity Strategy Enum
// =============================================================================

/// Proximity calculation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProximityStrategy {
    /// Global overlap across all terms
    Global,
    /// Per-term proximity with other terms, applied inline per match
    PerTerm,
    /// Pairwise overlap between term pairs
    Pairwise,
    /// IDF-weighted: rare terms have stronger proximity effect
    #[default]
    IdfWeighted,
}

impl ProximityStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProximityStrategy::Global => "global",
            ProximityStrategy::PerTerm => "per-term",
            ProximityStrategy::Pairwise => "pairwise",
            ProximityStrategy::IdfWeighted => "idf-weighted",
        }
    }

    /// Lenient parse; unknown names fall back to `IdfWeighted`
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "global" => ProximityStrategy::Global,
            "per-term" | "perterm" => ProximityStrategy::PerTerm,
            "pairwise" => ProximityStrategy::Pairwise,
            _ => ProximityStrategy::IdfWeighted,
        }
    }
}

// =============================================================================
// Proximity Result
// =============================================================================

/// Result of proximity calculation
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityResult {
    /// Final multiplier to apply to score
    pub multiplier: f64,
    /// Number of segments where all terms overlap
    pub overlap_count: u32,
    /// Length decay factor
    pub decay: f64,
    /// IDF boost factor (IdfWeighted only)
    pub idf_boost: f64,
}

impl Default for ProximityResult {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            overlap_count: 0,
            decay: 1.0,
            idf_boost: 1.0,
        }
    }
}

fn length_decay(document_length: u32, avg_doc_length: f64, decay_lambda: f64) -> f64 {
    let length_ratio = if avg_doc_length > 0.0 {
        document_length as f64 / avg_doc_length
    } else {
        1.0
    };
    (-decay_lambda * length_ratio).exp()
}

// =============================================================================
// Global Proximity
// =============================================================================

/// Global proximity multiplier
///
/// Computes overlap across ALL query terms. Terms must share a segment to
/// contribute. Returns a neutral result for fewer than 2 terms or
/// `max_segments == 0`.
pub fn global_proximity_multiplier(
    term_masks: &[u32],
    alpha: f64,
    max_segments: u32,
    document_length: u32,
    avg_doc_length: f64,
    decay_lambda: f64,
) -> ProximityResult {
    if term_masks.len() < 2 || max_segments == 0 {
        return ProximityResult::default();
    }

    let common_mask = term_masks.iter().fold(u32::MAX, |acc, &mask| acc & mask);
    let overlap_count = pop_count(common_mask);
    let max_possible_overlap = (term_masks.len() as u32).min(max_segments);

    let base_multiplier = overlap_count as f64 / max_possible_overlap as f64;
    let decay = length_decay(document_length, avg_doc_length, decay_lambda);

    ProximityResult {
        multiplier: 1.0 + alpha * base_multiplier * decay,
        overlap_count,
        decay,
        idf_boost: 1.0,
    }
}

// =============================================================================
// IDF-Weighted Proximity
// =============================================================================

/// IDF-weighted proximity multiplier
///
/// Same overlap and decay as [`global_proximity_multiplier`], amplified by
/// `1 + avgIDF / idf_scale` so clusters of rare terms get a stronger boost.
pub fn idf_weighted_proximity_multiplier(
    term_data: &[TermWithIdf],
    alpha: f64,
    max_segments: u32,
    document_length: u32,
    avg_doc_length: f64,
    decay_lambda: f64,
    idf_scale: f64,
) -> ProximityResult {
    if term_data.len() < 2 || max_segments == 0 {
        return ProximityResult::default();
    }

    let total_idf: f64 = term_data.iter().map(|t| t.idf).sum();
    let avg_idf = total_idf / term_data.len() as f64;

    let common_mask = term_data.iter().fold(u32::MAX, |acc, t| acc & t.mask);
    let overlap_count = pop_count(common_mask);
    let max_possible_overlap = (term_data.len() as u32).min(max_segments);

    let base_multiplier = overlap_count as f64 / max_possible_overlap as f64;
    let idf_boost = if idf_scale > 0.0 {
        1.0 + avg_idf / idf_scale
    } else {
        1.0
    };
    let decay = length_decay(document_length, avg_doc_length, decay_lambda);

    ProximityResult {
        multiplier: 1.0 + alpha * base_multiplier * idf_boost * decay,
        overlap_count,
        decay,
        idf_boost,
    }
}

// =============================================================================
// Per-Term Proximity
// =============================================================================

/// Per-term proximity multiplier
///
/// Average overlap between one term and the other matched terms.
pub fn per_term_proximity_multiplier(
    term_mask: u32,
    other_masks: &[u32],
    alpha: f64,
    max_segments: u32,
) -> f64 {
    if other_masks.is_empty() || max_segments == 0 {
        return 1.0;
    }

    let total_overlap: u32 = other_masks
        .iter()
        .map(|&other| pop_count(term_mask & other))
        .sum();
    let average_overlap = total_overlap as f64 / other_masks.len() as f64;
    let normalized_overlap = average_overlap / max_segments as f64;

    1.0 + alpha * normalized_overlap
}

// =============================================================================
// Pairwise Proximity
// =============================================================================

/// Pairwise proximity bonus (additive; callers apply `1 + bonus`)
pub fn pairwise_proximity_bonus(term_masks: &[u32], alpha: f64, max_segments: u32) -> f64 {
    if term_masks.len() < 2 || max_segments == 0 {
        return 0.0;
    }

    let mut total_proximity = 0.0;
    let mut pair_count = 0;

    for i in 0..term_masks.len() {
        for j in (i + 1)..term_masks.len() {
            let overlap = pop_count(term_masks[i] & term_masks[j]);
            total_proximity += overlap as f64 / max_segments as f64;
            pair_count += 1;
        }
    }

    alpha * (total_proximity / pair_count as f64)
}

// =============================================================================
// Phrase Detection
// =============================================================================

/// Detect if consecutive query terms appear in adjacent segments
///
/// Strict order: term[i] in segment N requires term[i+1] in segment N+1.
pub fn detect_phrase_match(query_terms: &[String], doc_term_masks: &HashMap<String, u32>) -> bool {
    if query_terms.len() < 2 {
        return false;
    }

    query_terms.windows(2).all(|pair| {
        match (doc_term_masks.get(&pair[0]), doc_term_masks.get(&pair[1])) {
            // 0001 << 1 = 0010; a hit means the next term sits one segment later
            (Some(&m1), Some(&m2)) => (m1 << 1) & m2 != 0,
            _ => false,
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_proximity() {
        let masks = vec![0b0001, 0b0001];
        let result = global_proximity_multiplier(&masks, 0.5, 16, 100, 100.0, 0.5);

        assert!(result.multiplier > 1.0);
        assert_eq!(result.overlap_count, 1);
        let expected = 1.0 + 0.5 * 0.5 * (-0.5f64).exp();
        assert!((result.multiplier - expected).abs() < 1e-12);
    }

    #[test]
    fn test_global_proximity_no_overlap() {
        let masks = vec![0b0001, 0b0010];
        let result = global_proximity_multiplier(&masks, 0.5, 16, 100, 100.0, 0.5);

        assert_eq!(result.overlap_count, 0);
        assert_eq!(result.multiplier, 1.0);
    }

    #[test]
    fn test_global_proximity_degenerate() {
        assert_eq!(
            global_proximity_multiplier(&[0b1], 0.5, 16, 100, 100.0, 0.5),
            ProximityResult::default()
        );
        assert_eq!(
            global_proximity_multiplier(&[0b1, 0b1], 0.5, 0, 100, 100.0, 0.5),
            ProximityResult::default()
        );
    }

    #[test]
    fn test_idf_weighted_proximity() {
        let term_data = vec![
            TermWithIdf { mask: 0b0001, idf: 3.0 },
            TermWithIdf { mask: 0b0001, idf: 3.0 },
        ];
        let result = idf_weighted_proximity_multiplier(&term_data, 0.5, 16, 100, 100.0, 0.5, 5.0);

        assert!(result.multiplier > 1.0);
        assert!((result.idf_boost - 1.6).abs() < 1e-12);

        // Rarer terms give a larger boost for the same overlap
        let rare = vec![
            TermWithIdf { mask: 0b0001, idf: 6.0 },
            TermWithIdf { mask: 0b0001, idf: 6.0 },
        ];
        let rare_result = idf_weighted_proximity_multiplier(&rare, 0.5, 16, 100, 100.0, 0.5, 5.0);
        assert!(rare_result.multiplier > result.multiplier);
    }

    #[test]
    fn test_per_term_proximity() {
        assert_eq!(per_term_proximity_multiplier(0b1, &[], 0.5, 16), 1.0);

        let m = per_term_proximity_multiplier(0b11, &[0b01, 0b11], 0.5, 16);
        // overlaps 1 and 2 -> average 1.5 -> 1.5 / 16
        assert!((m - (1.0 + 0.5 * 1.5 / 16.0)).abs() < 1e-12);
    }

    #[test]
    fn test_pairwise_proximity() {
        let masks = vec![0b1111, 0b1111, 0b1111];
        let bonus = pairwise_proximity_bonus(&masks, 0.5, 4);

        assert!(bonus > 0.0);
        assert!(bonus <= 0.5);
        assert_eq!(pairwise_proximity_bonus(&[0b1], 0.5, 4), 0.0);
    }

    #[test]
    fn test_phrase_detection() {
        let mut masks = HashMap::new();
        masks.insert("hello".to_string(), 0b01);
        masks.insert("world".to_string(), 0b10);

        let query = vec!["hello".to_string(), "world".to_string()];
        assert!(detect_phrase_match(&query, &masks));

        masks.insert("world".to_string(), 0b100000);
        assert!(!detect_phrase_match(&query, &masks));

        // Order matters
        masks.insert("world".to_string(), 0b01);
        masks.insert("hello".to_string(), 0b10);
        assert!(!detect_phrase_match(&query, &masks));
    }

    #[test]
    fn test_phrase_detection_requires_every_pair() {
        let mut masks = HashMap::new();
        masks.insert("a".to_string(), 0b001);
        masks.insert("b".to_string(), 0b010);

        let query: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert!(!detect_phrase_match(&query, &masks));

        masks.insert("c".to_string(), 0b100);
        assert!(detect_phrase_match(&query, &masks));

        assert!(!detect_phrase_match(&query[..1], &masks));
    }

    #[test]
    fn test_strategy_names() {
        for strategy in [
            ProximityStrategy::Global,
            ProximityStrategy::PerTerm,
            ProximityStrategy::Pairwise,
            ProximityStrategy::IdfWeighted,
        ] {
            assert_eq!(ProximityStrategy::from_name(strategy.as_str()), strategy);
        }
        assert_eq!(ProximityStrategy::from_name("bogus"), ProximityStrategy::IdfWeighted);
    }
}
