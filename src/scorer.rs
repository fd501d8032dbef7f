//! Main ResoRankScorer implementation
//!
//! The scoring engine: BM25F with proximity, BMX entropy extensions and an
//! optional dense-vector blend, over a two-tier (overlay + FST) index.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use wasm_bindgen::prelude::*;

use crate::config::{CorpusStatistics, ResoRankConfig, MAX_SEGMENT_BITS};
use crate::entropy::{calculate_query_entropy_stats, EntropyCache, QueryEntropyStats};
use crate::error::{IndexError, Result};
use crate::layered::{LayeredIndex, PostingSource};
use crate::math::{
    adaptive_segment_count, calculate_adaptive_alpha, calculate_beta, calculate_idf,
    cosine_similarity, format_binary, normalize_score, normalized_term_frequency,
    remap_segment_mask, saturate,
};
use crate::proximity::{
    detect_phrase_match, global_proximity_multiplier, idf_weighted_proximity_multiplier,
    pairwise_proximity_bonus, per_term_proximity_multiplier, ProximityResult, ProximityStrategy,
};
use crate::types::{
    DocumentAccumulator, DocumentMetadata, FieldContribution, Postings, ScoreExplanation,
    SearchOptions, SearchResult, TermBreakdown, TermWithIdf, TokenMetadata,
};

/// Target tokens per segment when adaptive segmentation is on
const TOKENS_PER_SEGMENT: u32 = 50;

/// Rescales cosine (0..1) toward the magnitude of typical lexical scores.
/// A heuristic, not a normalization.
const VECTOR_SCORE_SCALE: f64 = 20.0;

// =============================================================================
// Query Context
// =============================================================================

/// Per-query state shared by every candidate document
struct QueryContext<'q> {
    terms: &'q [String],
    /// Merged postings, parallel to `terms`
    postings: Vec<Postings>,
    entropy_stats: Option<QueryEntropyStats>,
    /// k1 or adaptive alpha
    alpha: f64,
    /// Entropy weight in the TF denominator (0 when BMX entropy is off)
    gamma: f64,
}

// =============================================================================
// Main Scorer
// =============================================================================

/// ResoRank Scorer - BM25F with Proximity, BMX and vector blending
///
/// Single-threaded per instance: callers serialize `index_document`,
/// `remove_document` and `compact` against each other and against reads.
#[wasm_bindgen]
pub struct ResoRankScorer {
    config: ResoRankConfig,
    corpus_stats: CorpusStatistics,

    // Indexes
    document_index: HashMap<String, DocumentMetadata>,
    index: LayeredIndex,

    // Caches
    idf_cache: HashMap<usize, f64>,
    entropy_cache: EntropyCache,
}

impl ResoRankScorer {
    /// Create a new scorer with empty corpus statistics
    pub fn new(config: ResoRankConfig) -> Self {
        Self::with_corpus_stats(config, CorpusStatistics::default())
    }

    /// Create a scorer seeded with corpus statistics
    pub fn with_corpus_stats(config: ResoRankConfig, corpus_stats: CorpusStatistics) -> Self {
        let entropy_cache = EntropyCache::new(config.entropy_cache_size);

        Self {
            config,
            corpus_stats,
            document_index: HashMap::new(),
            index: LayeredIndex::new(),
            idf_cache: HashMap::new(),
            entropy_cache,
        }
    }

    /// Validate the config before constructing
    pub fn try_new(config: ResoRankConfig, corpus_stats: CorpusStatistics) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_corpus_stats(config, corpus_stats))
    }

    pub fn config(&self) -> &ResoRankConfig {
        &self.config
    }

    pub fn corpus_statistics(&self) -> &CorpusStatistics {
        &self.corpus_stats
    }

    /// Replace corpus statistics (batch re-indexers push recomputed averages here)
    pub fn update_corpus_statistics(&mut self, stats: CorpusStatistics) {
        self.corpus_stats = stats;
        self.idf_cache.clear();
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// Index a document for later scoring.
    ///
    /// Overwrites the document's metadata and its overlay entry for every
    /// supplied term. Bumps `total_documents`; averages are left to the caller.
    pub fn index_document(
        &mut self,
        doc_id: &str,
        doc_meta: DocumentMetadata,
        tokens: HashMap<String, TokenMetadata>,
    ) {
        let remap_to = if self.config.use_adaptive_segments {
            Some(adaptive_segment_count(
                doc_meta.total_token_count,
                TOKENS_PER_SEGMENT,
            ))
        } else {
            None
        };

        self.document_index.insert(doc_id.to_string(), doc_meta);

        for (term, mut meta) in tokens {
            if let Some(effective_segments) = remap_to {
                meta.segment_mask = remap_segment_mask(
                    meta.segment_mask,
                    self.config.max_segments,
                    effective_segments,
                );
            }

            self.entropy_cache.invalidate(&term);
            self.index.insert(term, doc_id, meta);
        }

        self.corpus_stats.total_documents += 1;
        self.idf_cache.clear();
    }

    /// Remove a document from the index
    pub fn remove_document(&mut self, doc_id: &str) -> bool {
        if self.document_index.remove(doc_id).is_none() {
            return false;
        }

        self.index.remove_document(doc_id);
        self.corpus_stats.total_documents = self.corpus_stats.total_documents.saturating_sub(1);
        self.idf_cache.clear();
        self.entropy_cache.clear();

        debug!(doc_id, "removed document");
        true
    }

    /// Freeze the overlay into the FST tier.
    ///
    /// No-op when nothing is pending. On failure the previous frozen tier and
    /// the overlay are unchanged.
    pub fn compact(&mut self) -> Result<()> {
        if self.index.compact()? {
            info!(
                documents = self.document_index.len(),
                frozen_terms = self.index.frozen().map(|f| f.len()).unwrap_or(0),
                "compaction complete"
            );
        }
        Ok(())
    }

    /// Effective postings for a term (frozen overlaid by mutable, per doc)
    pub fn term_postings(&self, term: &str) -> Postings {
        self.index.postings(term)
    }

    /// Like [`term_postings`](Self::term_postings) but surfaces frozen-tier corruption
    pub fn try_term_postings(&self, term: &str) -> std::result::Result<Postings, IndexError> {
        self.index.try_postings(term)
    }

    // =========================================================================
    // IDF Cache
    // =========================================================================

    /// Pre-compute IDF values for every document frequency in the index
    pub fn warm_idf_cache(&mut self) {
        let mut unique_frequencies = HashSet::new();

        for term in self.index.terms() {
            for meta in self.index.postings(&term).values() {
                unique_frequencies.insert(meta.corpus_doc_frequency);
            }
        }

        for freq in unique_frequencies {
            cached_idf(&mut self.idf_cache, self.corpus_stats.total_documents, freq);
        }
    }

    /// Clear IDF cache
    pub fn clear_idf_cache(&mut self) {
        self.idf_cache.clear();
    }

    /// Clear entropy cache
    pub fn clear_entropy_cache(&mut self) {
        self.entropy_cache.clear();
    }

    // =========================================================================
    // Scoring
    // =========================================================================

    /// Score a document against a query. Unknown documents score 0.
    pub fn score(&mut self, query: &[String], query_vector: Option<&[f32]>, doc_id: &str) -> f64 {
        self.explain_score(query, query_vector, doc_id).total_score
    }

    /// Score with full explanation
    pub fn explain_score(
        &mut self,
        query: &[String],
        query_vector: Option<&[f32]>,
        doc_id: &str,
    ) -> ScoreExplanation {
        if !self.document_index.contains_key(doc_id) {
            return ScoreExplanation::empty(self.config.proximity_strategy.as_str());
        }

        let ctx = self.prepare_query(query);
        self.score_document(&ctx, query_vector, doc_id)
    }

    fn prepare_query<'q>(&mut self, query: &'q [String]) -> QueryContext<'q> {
        let postings = query.iter().map(|term| self.index.postings(term)).collect();

        let entropy_stats = if self.config.enable_bmx_entropy || self.config.enable_bmx_similarity
        {
            Some(calculate_query_entropy_stats(
                query,
                &mut self.entropy_cache,
                &self.index,
            ))
        } else {
            None
        };

        let alpha = if self.config.use_adaptive_alpha {
            calculate_adaptive_alpha(self.corpus_stats.average_document_length)
        } else {
            self.config.k1
        };

        let gamma = if self.config.enable_bmx_entropy {
            self.config.entropy_denom_weight.unwrap_or(alpha / 2.0)
        } else {
            0.0
        };

        QueryContext {
            terms: query,
            postings,
            entropy_stats,
            alpha,
            gamma,
        }
    }

    fn score_document(
        &mut self,
        ctx: &QueryContext<'_>,
        query_vector: Option<&[f32]>,
        doc_id: &str,
    ) -> ScoreExplanation {
        let Self {
            config,
            corpus_stats,
            document_index,
            idf_cache,
            entropy_cache,
            ..
        } = self;

        let strategy = config.proximity_strategy;
        let doc_meta = match document_index.get(doc_id) {
            Some(meta) => meta,
            None => return ScoreExplanation::empty(strategy.as_str()),
        };

        let avg_entropy = match (&ctx.entropy_stats, config.enable_bmx_entropy) {
            (Some(stats), true) => stats.avg_entropy,
            _ => 0.0,
        };

        let mut accumulator = DocumentAccumulator::new(doc_meta.total_token_count);
        let mut term_breakdown = Vec::new();
        let mut doc_term_masks = HashMap::new();

        for (term, postings) in ctx.terms.iter().zip(&ctx.postings) {
            let token_meta = match postings.get(doc_id) {
                Some(meta) => meta,
                None => continue,
            };

            let idf = cached_idf(
                idf_cache,
                corpus_stats.total_documents,
                token_meta.corpus_doc_frequency,
            );

            let mut aggregated_s = 0.0;
            let mut field_contributions = Vec::with_capacity(token_meta.field_occurrences.len());

            for (field, occurrence) in &token_meta.field_occurrences {
                let params = config.field_params_for(field);
                let normalized_tf = normalized_term_frequency(
                    occurrence.tf,
                    occurrence.field_length,
                    corpus_stats.average_field_length(field),
                    params.b,
                    avg_entropy,
                    ctx.gamma,
                );

                let weighted_contribution = params.weight * normalized_tf;
                aggregated_s += weighted_contribution;

                field_contributions.push(FieldContribution {
                    field: field.clone(),
                    tf: occurrence.tf,
                    field_length: occurrence.field_length,
                    normalized_tf,
                    weighted_contribution,
                });
            }

            let saturated_score = idf * saturate(aggregated_s, ctx.alpha);

            // Per-term proximity is applied inline against the terms matched so
            // far; the other strategies apply one multiplier after the loop.
            let per_term_proximity = if strategy == ProximityStrategy::PerTerm {
                per_term_proximity_multiplier(
                    token_meta.segment_mask,
                    &accumulator.term_masks,
                    config.proximity_alpha,
                    config.max_segments,
                )
            } else {
                1.0
            };
            accumulator.bm25_score += saturated_score * per_term_proximity;

            accumulator.term_masks.push(token_meta.segment_mask);
            accumulator.term_idfs.push(idf);
            doc_term_masks.insert(term.clone(), token_meta.segment_mask);

            term_breakdown.push(TermBreakdown {
                term: term.clone(),
                idf,
                aggregated_s,
                saturated_score,
                per_term_proximity,
                segment_mask: format_binary(
                    token_meta.segment_mask,
                    config.max_segments.min(MAX_SEGMENT_BITS),
                ),
                field_contributions,
                entropy: ctx
                    .entropy_stats
                    .as_ref()
                    .and_then(|s| s.normalized_entropies.get(term).copied()),
                raw_entropy: entropy_cache.get_cached(term),
            });
        }

        // Strategy-level proximity
        let prox_result = if strategy != ProximityStrategy::PerTerm && accumulator.matched_terms() > 0
        {
            proximity_multiplier(config, corpus_stats, &accumulator)
        } else {
            ProximityResult::default()
        };
        let mut total = accumulator.bm25_score * prox_result.multiplier;

        // Phrase boost
        let mut phrase_boost = 1.0;
        if config.enable_phrase_boost
            && ctx.terms.len() >= 2
            && detect_phrase_match(ctx.terms, &doc_term_masks)
        {
            phrase_boost = config.phrase_boost_multiplier;
            total *= phrase_boost;
        }

        // BMX similarity boost
        let beta = calculate_beta(corpus_stats.total_documents);
        let (bmx_boost, bmx_similarity) = match &ctx.entropy_stats {
            Some(stats) if config.enable_bmx_similarity && !ctx.terms.is_empty() => {
                let similarity = accumulator.matched_terms() as f64 / ctx.terms.len() as f64;
                let boost = beta * similarity * stats.sum_normalized_entropies;
                total += boost;
                (Some(boost), Some(similarity))
            }
            _ => (None, None),
        };

        // Dense-vector blend
        let lexical_score = total;
        let vector_similarity = match (query_vector, doc_meta.embedding.as_deref()) {
            (Some(query_vec), Some(embedding)) => {
                let similarity = cosine_similarity(query_vec, embedding).max(0.0);
                total = (1.0 - config.vector_alpha) * lexical_score
                    + config.vector_alpha * similarity * VECTOR_SCORE_SCALE;
                Some(similarity)
            }
            _ => None,
        };

        ScoreExplanation {
            total_score: total,
            bm25_component: accumulator.bm25_score,
            lexical_score,
            proximity_multiplier: prox_result.multiplier,
            idf_proximity_boost: prox_result.idf_boost,
            length_decay: prox_result.decay,
            phrase_boost,
            overlap_count: prox_result.overlap_count,
            term_breakdown,
            strategy: strategy.as_str().to_string(),
            bmx_entropy_similarity_boost: bmx_boost,
            bmx_similarity,
            bmx_avg_entropy: ctx.entropy_stats.as_ref().map(|s| s.avg_entropy),
            bmx_alpha: config.use_adaptive_alpha.then_some(ctx.alpha),
            bmx_beta: config.enable_bmx_similarity.then_some(beta),
            vector_similarity,
        }
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Search for documents matching the query.
    ///
    /// With a query vector every indexed document is a candidate (brute force).
    /// `limit == 0` returns all positive-scoring documents.
    pub fn search(
        &mut self,
        query: &[String],
        query_vector: Option<&[f32]>,
        limit: usize,
    ) -> Vec<SearchResult> {
        self.search_with_options(query, query_vector, &SearchOptions::with_limit(limit))
    }

    /// Search with scope filtering and optional score normalization
    pub fn search_with_options(
        &mut self,
        query: &[String],
        query_vector: Option<&[f32]>,
        options: &SearchOptions,
    ) -> Vec<SearchResult> {
        let ctx = self.prepare_query(query);

        let mut candidates: HashSet<&str> = ctx
            .postings
            .iter()
            .flat_map(|postings| postings.keys().map(String::as_str))
            .collect();
        if query_vector.is_some() {
            candidates.extend(self.document_index.keys().map(String::as_str));
        }

        let candidates: Vec<String> = candidates
            .into_iter()
            .filter(|doc_id| match self.document_index.get(*doc_id) {
                Some(meta) => options
                    .scope
                    .as_ref()
                    .map_or(true, |scope| scope.matches(&meta.scope_tags)),
                None => false,
            })
            .map(str::to_string)
            .collect();

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|doc_id| {
                let score = self.score_document(&ctx, query_vector, &doc_id).total_score;
                (score > 0.0).then_some(SearchResult {
                    doc_id,
                    score,
                    normalized_score: None,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });

        if let Some(limit) = options.limit.filter(|&limit| limit > 0) {
            results.truncate(limit);
        }

        if options.normalize {
            for result in &mut results {
                result.normalized_score = Some(normalize_score(
                    result.score,
                    query.len(),
                    self.corpus_stats.total_documents,
                ));
            }
        }

        results
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Get index statistics
    pub fn stats(&self) -> ScorerStats {
        let frozen = self.index.frozen();
        ScorerStats {
            document_count: self.document_index.len(),
            mutable_term_count: self.index.mutable_term_count(),
            frozen_term_count: frozen.map(|f| f.len()).unwrap_or(0),
            frozen_bytes: frozen
                .map(|f| f.fst_bytes() + f.postings_bytes())
                .unwrap_or(0),
            idf_cache_size: self.idf_cache.len(),
            entropy_cache_size: self.entropy_cache.len(),
        }
    }
}

/// Memoized IDF keyed by document frequency
fn cached_idf(cache: &mut HashMap<usize, f64>, total_documents: usize, doc_frequency: usize) -> f64 {
    *cache
        .entry(doc_frequency)
        .or_insert_with(|| calculate_idf(total_documents as f64, doc_frequency))
}

/// Whole-document proximity multiplier for the non per-term strategies
fn proximity_multiplier(
    config: &ResoRankConfig,
    corpus_stats: &CorpusStatistics,
    accumulator: &DocumentAccumulator,
) -> ProximityResult {
    match config.proximity_strategy {
        ProximityStrategy::Global => global_proximity_multiplier(
            &accumulator.term_masks,
            config.proximity_alpha,
            config.max_segments,
            accumulator.document_length,
            corpus_stats.average_document_length,
            config.proximity_decay_lambda,
        ),

        ProximityStrategy::IdfWeighted => {
            let term_data: Vec<_> = accumulator
                .term_masks
                .iter()
                .zip(&accumulator.term_idfs)
                .map(|(&mask, &idf)| TermWithIdf { mask, idf })
                .collect();

            idf_weighted_proximity_multiplier(
                &term_data,
                config.proximity_alpha,
                config.max_segments,
                accumulator.document_length,
                corpus_stats.average_document_length,
                config.proximity_decay_lambda,
                config.idf_proximity_scale,
            )
        }

        ProximityStrategy::Pairwise => {
            let bonus = pairwise_proximity_bonus(
                &accumulator.term_masks,
                config.proximity_alpha,
                config.max_segments,
            );
            ProximityResult {
                multiplier: 1.0 + bonus,
                ..ProximityResult::default()
            }
        }

        ProximityStrategy::PerTerm => ProximityResult::default(),
    }
}

/// Scorer statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScorerStats {
    pub document_count: usize,
    pub mutable_term_count: usize,
    pub frozen_term_count: usize,
    pub frozen_bytes: usize,
    pub idf_cache_size: usize,
    pub entropy_cache_size: usize,
}

// =============================================================================
// Tests
// =============================================================================
