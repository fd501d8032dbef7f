//! Math utilities for ResoRank
//!
//! Pure scoring primitives: IDF, TF normalization, saturation, BMX parameters,
//! cosine similarity and segment-mask bit operations.

// =============================================================================
// IDF Calculation
// =============================================================================

/// Calculate Inverse Document Frequency (IDF)
///
/// Uses the standard BM25 IDF formula:
/// IDF = ln(1 + max(0, (N - df + 0.5) / (df + 0.5)))
///
/// # Arguments
/// * `total_documents` - Total number of documents in corpus
/// * `doc_frequency` - Number of documents containing this term
///
/// # Returns
/// IDF value (always >= 0)
#[inline]
pub fn calculate_idf(total_documents: f64, doc_frequency: usize) -> f64 {
    if doc_frequency == 0 {
        return 0.0;
    }

    let df = doc_frequency as f64;
    let ratio = (total_documents - df + 0.5) / (df + 0.5);

    (1.0 + ratio.max(0.0)).ln()
}

// =============================================================================
// Term Frequency Normalization
// =============================================================================

/// BMX-enhanced normalized term frequency
///
/// tf / (1 - b + b * (fieldLength / avgFieldLength) + gamma * avgEntropy)
///
/// With `avg_entropy = 0` or `gamma = 0` this is plain BM25F normalization.
#[inline]
pub fn normalized_term_frequency(
    tf: u32,
    field_length: u32,
    average_field_length: f64,
    b: f64,
    avg_entropy: f64,
    gamma: f64,
) -> f64 {
    if average_field_length <= 0.0 || tf == 0 {
        return 0.0;
    }

    let length_norm = 1.0 - b + b * (field_length as f64 / average_field_length);
    let denominator = length_norm + gamma * avg_entropy;

    if denominator > 0.0 {
        tf as f64 / denominator
    } else {
        0.0
    }
}

// =============================================================================
// Saturation
// =============================================================================

/// Term saturation function (BM25)
///
/// ((k1 + 1) * score) / (k1 + score). Works with either k1 or adaptive alpha.
/// Non-positive `k1` passes the score through unchanged.
#[inline]
pub fn saturate(aggregated_score: f64, k1: f64) -> f64 {
    if !aggregated_score.is_finite() || aggregated_score <= 0.0 {
        return 0.0;
    }

    if k1 <= 0.0 {
        return aggregated_score;
    }

    ((k1 + 1.0) * aggregated_score) / (k1 + aggregated_score)
}

// =============================================================================
// Bit Operations
// =============================================================================

/// Population count (number of set bits in a u32)
///
/// SWAR bit counting, no hardware intrinsics required.
#[inline]
pub fn pop_count(mut n: u32) -> u32 {
    n = n - ((n >> 1) & 0x55555555);
    n = (n & 0x33333333) + ((n >> 2) & 0x33333333);
    (((n + (n >> 4)) & 0x0F0F0F0F).wrapping_mul(0x01010101)) >> 24
}

/// Format a number as binary string with fixed width
#[inline]
pub fn format_binary(n: u32, bits: u32) -> String {
    format!("{:0width$b}", n, width = bits as usize)
}

// =============================================================================
// Segment Calculation
// =============================================================================

/// Adaptive segment count: ceil(doc_length / tokens_per_segment), clamped to [8, 32]
#[inline]
pub fn adaptive_segment_count(doc_length: u32, tokens_per_segment: u32) -> u32 {
    if tokens_per_segment == 0 {
        return 32;
    }
    let raw = (doc_length as f64 / tokens_per_segment as f64).ceil() as u32;
    raw.clamp(8, 32)
}

/// Project a segment mask from one granularity onto another.
///
/// Each set bit `i` maps to `floor(i / from * to)`; bits beyond 32 are dropped.
pub fn remap_segment_mask(mask: u32, from_segments: u32, to_segments: u32) -> u32 {
    if from_segments == to_segments || from_segments == 0 {
        return mask;
    }

    let mut new_mask = 0u32;
    for i in 0..from_segments.min(32) {
        if mask & (1 << i) != 0 {
            let mapped_bit = ((i as f64 / from_segments as f64) * to_segments as f64) as u32;
            if mapped_bit < 32 {
                new_mask |= 1 << mapped_bit;
            }
        }
    }
    new_mask
}

// =============================================================================
// BMX Parameter Calculations
// =============================================================================

/// Sigmoid function for entropy calculation
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Adaptive alpha: clamp(avgDocLength / 100, 0.5, 1.5)
#[inline]
pub fn calculate_adaptive_alpha(average_document_length: f64) -> f64 {
    (average_document_length / 100.0).clamp(0.5, 1.5)
}

/// Similarity boost weight: 1 / ln(1 + N), or 1.0 for an empty corpus
#[inline]
pub fn calculate_beta(total_documents: usize) -> f64 {
    if total_documents == 0 {
        return 1.0;
    }
    1.0 / (1.0 + total_documents as f64).ln()
}

/// Normalize a raw score against an approximate per-query maximum
#[inline]
pub fn normalize_score(raw_score: f64, query_length: usize, total_documents: usize) -> f64 {
    let max_idf_approx = (1.0 + (total_documents as f64 - 0.5) / 1.5).ln();
    let score_max = query_length as f64 * (max_idf_approx + 1.0);

    if score_max > 0.0 {
        raw_score / score_max
    } else {
        0.0
    }
}

// =============================================================================
// Vector Similarity
// =============================================================================

/// Cosine similarity with f64 accumulators.
///
/// Returns 0.0 on length mismatch, empty input, or a zero-norm vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// =============================================================================
// Tests
// =============================================================================
