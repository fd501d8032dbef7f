//! Entropy calculations for BMX
//!
//! Implements term entropy computation and LRU caching for the
//! BMX (BM25 with Entropy) extension.

use std::collections::{HashMap, VecDeque};

use crate::layered::PostingSource;
use crate::math::sigmoid;

/// TF is capped before the sigmoid so very frequent terms don't saturate to 1
const ENTROPY_TF_CAP: u32 = 10;

// =============================================================================
// Entropy Cache
// =============================================================================

/// LRU cache for computed entropy values
///
/// Access order is a queue: hits move the key to the back, eviction pops the
/// front. Finding the key is O(n), fine for the cache sizes used here.
pub struct EntropyCache {
    cache: HashMap<String, f64>,
    access_order: VecDeque<String>,
    max_size: usize,
}

impl EntropyCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(max_size),
            access_order: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Get entropy value (compute if missing)
    pub fn get<S: PostingSource + ?Sized>(&mut self, term: &str, source: &S) -> f64 {
        if let Some(&entropy) = self.cache.get(term) {
            self.mark_accessed(term);
            return entropy;
        }

        let entropy = compute_entropy(term, source);
        self.set(term.to_string(), entropy);
        entropy
    }

    /// Check if term is in cache
    pub fn has(&self, term: &str) -> bool {
        self.cache.contains_key(term)
    }

    /// Get cached value without computing or touching LRU order
    pub fn get_cached(&self, term: &str) -> Option<f64> {
        self.cache.get(term).copied()
    }

    /// Drop every entry at once
    pub fn clear(&mut self) {
        self.cache = HashMap::with_capacity(self.max_size);
        self.access_order = VecDeque::with_capacity(self.max_size);
    }

    /// Drop a single term whose postings changed
    pub fn invalidate(&mut self, term: &str) -> bool {
        if self.cache.remove(term).is_none() {
            return false;
        }
        if let Some(idx) = self.access_order.iter().position(|t| t == term) {
            self.access_order.remove(idx);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> EntropyCacheStats {
        EntropyCacheStats {
            size: self.cache.len(),
            capacity: self.max_size,
        }
    }

    /// Set value with LRU eviction
    fn set(&mut self, term: String, entropy: f64) {
        if self.max_size == 0 {
            return;
        }

        if self.cache.len() >= self.max_size {
            if let Some(evict_key) = self.access_order.pop_front() {
                self.cache.remove(&evict_key);
            }
        }

        self.cache.insert(term.clone(), entropy);
        self.access_order.push_back(term);
    }

    /// Move term to the back of the LRU queue
    fn mark_accessed(&mut self, term: &str) {
        if let Some(idx) = self.access_order.iter().position(|t| t == term) {
            if let Some(t) = self.access_order.remove(idx) {
                self.access_order.push_back(t);
            }
        }
    }
}

impl Default for EntropyCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Raw entropy of a term over its postings:
/// `-sum p_j ln p_j` with `p_j = sigmoid(min(tf_j, 10))`.
fn compute_entropy<S: PostingSource + ?Sized>(term: &str, source: &S) -> f64 {
    let mut raw_entropy = 0.0;

    for metadata in source.postings(term).values() {
        let capped_tf = metadata.total_tf().min(ENTROPY_TF_CAP) as f64;
        let pj = sigmoid(capped_tf);

        if pj > 1e-6 && pj < 0.999999 {
            raw_entropy -= pj * pj.ln();
        }
    }

    raw_entropy
}

// =============================================================================
// Entropy Cache Stats
// =============================================================================

/// Statistics for the entropy cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropyCacheStats {
    pub size: usize,
    pub capacity: usize,
}

// =============================================================================
// Query Entropy Calculation
// =============================================================================

/// Query-level entropy statistics
#[derive(Debug, Clone, Default)]
pub struct QueryEntropyStats {
    pub normalized_entropies: HashMap<String, f64>,
    pub avg_entropy: f64,
    pub sum_normalized_entropies: f64,
    pub max_raw_entropy: f64,
}

/// Normalize each query term's entropy by the query maximum and aggregate.
pub fn calculate_query_entropy_stats<S: PostingSource + ?Sized>(
    query: &[String],
    cache: &mut EntropyCache,
    source: &S,
) -> QueryEntropyStats {
    if query.is_empty() {
        return QueryEntropyStats::default();
    }

    let raw: Vec<f64> = query.iter().map(|term| cache.get(term, source)).collect();
    let max_raw_entropy = raw.iter().copied().fold(0.0, f64::max);
    let normalization_factor = max_raw_entropy.max(1e-9);

    let mut normalized_entropies = HashMap::with_capacity(query.len());
    let mut sum_normalized = 0.0;
    for (term, raw_entropy) in query.iter().zip(&raw) {
        let normalized = raw_entropy / normalization_factor;
        normalized_entropies.insert(term.clone(), normalized);
        sum_normalized += normalized;
    }

    QueryEntropyStats {
        normalized_entropies,
        avg_entropy: sum_normalized / query.len() as f64,
        sum_normalized_entropies: sum_normalized,
        max_raw_entropy,
    }
}

// =============================================================================
// Tests
// =============================================================================
