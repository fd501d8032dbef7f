//! Ranking contract tests
//!
//! Hybrid blend ordering, field weighting and phrase boosting as seen through
//! `search` and `score`.

use std::collections::HashMap;

use super::{query, single_token};
use crate::config::{FieldParams, ResoRankConfig};
use crate::proximity::ProximityStrategy;
use crate::scorer::ResoRankScorer;
use crate::types::{DocumentMetadata, TokenMetadata};

fn apple() -> TokenMetadata {
    TokenMetadata::new(2)
        .with_field("content", 1, 50)
        .with_segment_mask(0b1)
}

// ============================================================================
// Hybrid Ranking
// ============================================================================

fn hybrid_scorer() -> ResoRankScorer {
    let config = ResoRankConfig {
        vector_alpha: 0.5,
        ..ResoRankConfig::default()
    };
    let mut scorer = ResoRankScorer::new(config);

    scorer.index_document(
        "doc1",
        DocumentMetadata::new().with_embedding(vec![1.0, 0.0]),
        single_token("apple", apple()),
    );
    scorer.index_document(
        "doc2",
        DocumentMetadata::new().with_embedding(vec![0.0, 1.0]),
        HashMap::new(),
    );
    scorer.index_document(
        "doc3",
        DocumentMetadata::new().with_embedding(vec![0.0, 1.0]),
        single_token("apple", apple()),
    );

    scorer
}

#[test]
fn test_hybrid_ranking_order() {
    let mut scorer = hybrid_scorer();

    let results = scorer.search(&query(&["apple"]), Some(&[0.0, 1.0]), 10);
    let ids: Vec<_> = results.iter().map(|r| r.doc_id.as_str()).collect();

    assert_eq!(results.len(), 3);
    assert_eq!(ids[0], "doc3");
    assert!(ids.contains(&"doc1"));
    assert!(ids.contains(&"doc2"));
    assert!(results.iter().all(|r| r.score > 0.0));
}

#[test]
fn test_vector_only_document_needs_query_vector() {
    let mut scorer = hybrid_scorer();

    let text_only = scorer.search(&query(&["apple"]), None, 10);
    let ids: Vec<_> = text_only.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(ids, vec!["doc1", "doc3"]);

    // doc2 ranks purely on the scaled cosine
    let score = scorer.score(&query(&["apple"]), Some(&[0.0, 1.0]), "doc2");
    assert!((score - 10.0).abs() < 1e-9);
}

#[test]
fn test_pure_lexical_ignores_vector() {
    let mut scorer = ResoRankScorer::new(ResoRankConfig::default());
    scorer.index_document(
        "doc1",
        DocumentMetadata::new().with_embedding(vec![1.0, 0.0]),
        single_token("apple", apple()),
    );

    let with_vector = scorer.score(&query(&["apple"]), Some(&[1.0, 0.0]), "doc1");
    let without = scorer.score(&query(&["apple"]), None, "doc1");
    assert_eq!(with_vector, without);
}

// ============================================================================
// Field Weights
// ============================================================================

#[test]
fn test_title_weight_beats_body() {
    let mut config = ResoRankConfig::default();
    config.field_weights.insert("title".to_string(), 10.0);
    config.field_weights.insert("body".to_string(), 1.0);
    let mut scorer = ResoRankScorer::new(config);

    scorer.index_document(
        "in-title",
        DocumentMetadata::new(),
        single_token("hello", TokenMetadata::new(2).with_field("title", 1, 10)),
    );
    scorer.index_document(
        "in-body",
        DocumentMetadata::new(),
        single_token("hello", TokenMetadata::new(2).with_field("body", 1, 10)),
    );

    let q = query(&["hello"]);
    assert!(scorer.score(&q, None, "in-title") > scorer.score(&q, None, "in-body"));

    let results = scorer.search(&q, None, 0);
    assert_eq!(results[0].doc_id, "in-title");
}

#[test]
fn test_field_params_take_precedence_over_weights() {
    let mut config = ResoRankConfig::default();
    config.field_weights.insert("title".to_string(), 10.0);
    config
        .field_params
        .insert("title".to_string(), FieldParams::new(0.1, 0.75));
    let mut scorer = ResoRankScorer::new(config);

    scorer.index_document(
        "in-title",
        DocumentMetadata::new(),
        single_token("hello", TokenMetadata::new(2).with_field("title", 1, 10)),
    );
    scorer.index_document(
        "in-content",
        DocumentMetadata::new(),
        single_token("hello", TokenMetadata::new(2).with_field("content", 1, 10)),
    );

    let q = query(&["hello"]);
    assert!(scorer.score(&q, None, "in-title") < scorer.score(&q, None, "in-content"));
}

// ============================================================================
// Phrase Boost
// ============================================================================

fn phrase_doc(fox_mask: u32) -> HashMap<String, TokenMetadata> {
    let mut tokens = HashMap::new();
    tokens.insert(
        "quick".to_string(),
        TokenMetadata::new(2)
            .with_field("content", 1, 100)
            .with_segment_mask(0b01),
    );
    tokens.insert(
        "fox".to_string(),
        TokenMetadata::new(2)
            .with_field("content", 1, 100)
            .with_segment_mask(fox_mask),
    );
    tokens
}

#[test]
fn test_adjacent_segments_get_phrase_boost() {
    let mut scorer = ResoRankScorer::new(ResoRankConfig::default());
    scorer.index_document("adjacent", DocumentMetadata::new(), phrase_doc(0b10));
    scorer.index_document("distant", DocumentMetadata::new(), phrase_doc(0b100000));

    let q = query(&["quick", "fox"]);
    let adjacent = scorer.score(&q, None, "adjacent");
    let distant = scorer.score(&q, None, "distant");

    // Neither pair shares a segment, so only the phrase boost differs
    assert!((adjacent / distant - 1.5).abs() < 1e-12);

    // Reversed query order is not a phrase
    let reversed = query(&["fox", "quick"]);
    assert_eq!(
        scorer.explain_score(&reversed, None, "adjacent").phrase_boost,
        1.0
    );
}

#[test]
fn test_phrase_boost_can_be_disabled() {
    let config = ResoRankConfig {
        enable_phrase_boost: false,
        ..ResoRankConfig::default()
    };
    let mut scorer = ResoRankScorer::new(config);
    scorer.index_document("adjacent", DocumentMetadata::new(), phrase_doc(0b10));
    scorer.index_document("distant", DocumentMetadata::new(), phrase_doc(0b100000));

    let q = query(&["quick", "fox"]);
    assert_eq!(
        scorer.score(&q, None, "adjacent"),
        scorer.score(&q, None, "distant")
    );
}

// ============================================================================
// Proximity
// ============================================================================

#[test]
fn test_shared_segments_rank_higher_under_every_strategy() {
    for strategy in [
        ProximityStrategy::Global,
        ProximityStrategy::PerTerm,
        ProximityStrategy::Pairwise,
        ProximityStrategy::IdfWeighted,
    ] {
        let config = ResoRankConfig {
            proximity_strategy: strategy,
            enable_phrase_boost: false,
            ..ResoRankConfig::default()
        };
        let mut scorer = ResoRankScorer::new(config);
        scorer.index_document("together", DocumentMetadata::new(), phrase_doc(0b01));
        scorer.index_document("apart", DocumentMetadata::new(), phrase_doc(0b10));

        let results = scorer.search(&query(&["quick", "fox"]), None, 0);
        assert_eq!(results[0].doc_id, "together", "{:?}", strategy);
        assert!(results[0].score > results[1].score, "{:?}", strategy);
    }
}

#[test]
fn test_bmx_preset_ranks_full_matches_first() {
    let mut scorer = ResoRankScorer::new(ResoRankConfig::bmx());
    scorer.index_document("both", DocumentMetadata::new(), phrase_doc(0b01));
    scorer.index_document(
        "quick-only",
        DocumentMetadata::new(),
        single_token(
            "quick",
            TokenMetadata::new(2)
                .with_field("content", 1, 100)
                .with_segment_mask(0b01),
        ),
    );

    let q = query(&["quick", "fox"]);
    let results = scorer.search(&q, None, 0);
    assert_eq!(results[0].doc_id, "both");

    let explanation = scorer.explain_score(&q, None, "quick-only");
    assert_eq!(explanation.bmx_similarity, Some(0.5));
}
