//! Core data structures for ResoRank
//!
//! Inputs arrive pre-tokenized: per-term field occurrences plus a positional
//! segment mask. Postings and field maps are ordered so that encoded bytes and
//! float accumulation order are stable across compaction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::FieldName;

/// Postings for one term: doc ID -> token metadata
pub type Postings = BTreeMap<String, TokenMetadata>;

// =============================================================================
// Token Metadata
// =============================================================================

/// Field occurrence data within a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOccurrence {
    /// Term frequency in this field
    pub tf: u32,
    /// Length of this field (in tokens)
    pub field_length: u32,
}

/// Metadata for a token in a specific document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Occurrences by field (field name -> occurrence data)
    #[serde(default)]
    pub field_occurrences: BTreeMap<FieldName, FieldOccurrence>,
    /// Bitmask indicating which segments contain this token
    #[serde(default)]
    pub segment_mask: u32,
    /// Number of documents in corpus containing this term (caller-maintained)
    #[serde(default)]
    pub corpus_doc_frequency: usize,
}

impl TokenMetadata {
    pub fn new(corpus_doc_frequency: usize) -> Self {
        Self {
            field_occurrences: BTreeMap::new(),
            segment_mask: 0,
            corpus_doc_frequency,
        }
    }

    /// Add an occurrence in a specific field
    pub fn add_field_occurrence(&mut self, field: impl Into<FieldName>, tf: u32, field_length: u32) {
        self.field_occurrences
            .insert(field.into(), FieldOccurrence { tf, field_length });
    }

    /// Set segment mask (bitmap of segments where this token appears)
    pub fn set_segment_mask(&mut self, mask: u32) {
        self.segment_mask = mask;
    }

    /// Builder-style variant of [`set_segment_mask`](Self::set_segment_mask)
    pub fn with_segment_mask(mut self, mask: u32) -> Self {
        self.segment_mask = mask;
        self
    }

    /// Builder-style variant of [`add_field_occurrence`](Self::add_field_occurrence)
    pub fn with_field(mut self, field: impl Into<FieldName>, tf: u32, field_length: u32) -> Self {
        self.add_field_occurrence(field, tf, field_length);
        self
    }

    /// Sum of term frequencies across all fields
    pub fn total_tf(&self) -> u32 {
        self.field_occurrences
            .values()
            .fold(0u32, |acc, occ| acc.saturating_add(occ.tf))
    }
}

// =============================================================================
// Document Metadata
// =============================================================================

/// Scope labels attached to a document by the ingestion layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTags {
    #[serde(default)]
    pub narrative_id: Option<String>,
    #[serde(default)]
    pub folder_path: Option<String>,
}

/// Metadata for an indexed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Field lengths (field -> length in tokens)
    #[serde(default)]
    pub field_lengths: HashMap<FieldName, u32>,
    /// Total token count across all fields
    #[serde(default)]
    pub total_token_count: u32,
    /// Optional dense embedding; absent disables vector scoring for the doc
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub scope_tags: ScopeTags,
}

impl DocumentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the length of a specific field
    pub fn set_field_length(&mut self, field: impl Into<FieldName>, length: u32) {
        self.field_lengths.insert(field.into(), length);
        self.recalculate_total();
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_scope(mut self, scope_tags: ScopeTags) -> Self {
        self.scope_tags = scope_tags;
        self
    }

    fn recalculate_total(&mut self) {
        self.total_token_count = self
            .field_lengths
            .values()
            .fold(0u32, |acc, &len| acc.saturating_add(len));
    }
}

// =============================================================================
// Internal Accumulator (used during scoring)
// =============================================================================

/// Accumulator for scoring a document
#[derive(Debug, Clone)]
pub struct DocumentAccumulator {
    /// Accumulated BM25 score
    pub bm25_score: f64,
    /// Segment masks for each matched query term
    pub term_masks: Vec<u32>,
    /// IDF values for each matched query term
    pub term_idfs: Vec<f64>,
    /// Total document length
    pub document_length: u32,
}

impl DocumentAccumulator {
    pub fn new(document_length: u32) -> Self {
        Self {
            bm25_score: 0.0,
            term_masks: Vec::new(),
            term_idfs: Vec::new(),
            document_length,
        }
    }

    /// Number of query terms that matched the document
    pub fn matched_terms(&self) -> usize {
        self.term_masks.len()
    }
}

/// Term data with IDF (for proximity calculations)
#[derive(Debug, Clone, Copy)]
pub struct TermWithIdf {
    pub mask: u32,
    pub idf: f64,
}

// =============================================================================
// Score Explanation Types
// =============================================================================

/// Breakdown of a single term's contribution to the score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermBreakdown {
    pub term: String,
    pub idf: f64,
    pub aggregated_s: f64,
    pub saturated_score: f64,
    /// Multiplier applied inline under the per-term strategy (1.0 otherwise)
    pub per_term_proximity: f64,
    pub segment_mask: String,
    pub field_contributions: Vec<FieldContribution>,
    // BMX fields
    pub entropy: Option<f64>,
    pub raw_entropy: Option<f64>,
}

/// Contribution from a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldContribution {
    pub field: FieldName,
    pub tf: u32,
    pub field_length: u32,
    pub normalized_tf: f64,
    pub weighted_contribution: f64,
}

/// Full explanation of a document's score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreExplanation {
    pub total_score: f64,
    pub bm25_component: f64,
    pub lexical_score: f64,
    pub proximity_multiplier: f64,
    pub idf_proximity_boost: f64,
    pub length_decay: f64,
    pub phrase_boost: f64,
    pub overlap_count: u32,
    pub term_breakdown: Vec<TermBreakdown>,
    pub strategy: String,
    // BMX fields
    pub bmx_entropy_similarity_boost: Option<f64>,
    pub bmx_similarity: Option<f64>,
    pub bmx_avg_entropy: Option<f64>,
    pub bmx_alpha: Option<f64>,
    pub bmx_beta: Option<f64>,
    // Vector fields
    pub vector_similarity: Option<f64>,
}

impl ScoreExplanation {
    pub fn empty(strategy: &str) -> Self {
        Self {
            total_score: 0.0,
            bm25_component: 0.0,
            lexical_score: 0.0,
            proximity_multiplier: 1.0,
            idf_proximity_boost: 1.0,
            length_decay: 1.0,
            phrase_boost: 1.0,
            overlap_count: 0,
            term_breakdown: Vec::new(),
            strategy: strategy.to_string(),
            bmx_entropy_similarity_boost: None,
            bmx_similarity: None,
            bmx_avg_entropy: None,
            bmx_alpha: None,
            bmx_beta: None,
            vector_similarity: None,
        }
    }
}

// =============================================================================
// Search Results
// =============================================================================

/// Search result with document ID and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: String,
    pub score: f64,
    pub normalized_score: Option<f64>,
}

/// Restricts a search to documents carrying matching scope tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeFilter {
    /// Exact narrative match
    #[serde(default)]
    pub narrative_id: Option<String>,
    /// Folder path prefix match
    #[serde(default)]
    pub folder_path: Option<String>,
}

impl ScopeFilter {
    pub fn matches(&self, tags: &ScopeTags) -> bool {
        if let Some(narrative) = &self.narrative_id {
            if tags.narrative_id.as_deref() != Some(narrative.as_str()) {
                return false;
            }
        }

        if let Some(prefix) = &self.folder_path {
            match tags.folder_path.as_deref() {
                Some(path) if path.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        true
    }
}

/// Search options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Cap on results; `None` or 0 returns everything with a positive score
    #[serde(default)]
    pub limit: Option<usize>,
    /// Fill `normalized_score` on each result
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub scope: Option<ScopeFilter>,
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}
