//! Configuration types and defaults for ResoRank
//!
//! Every knob consulted during scoring lives on [`ResoRankConfig`]. The config is
//! immutable once handed to a scorer. Partial JSON/JS objects deserialize with
//! the documented defaults filled in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::ConfigError;
use crate::proximity::ProximityStrategy;

/// Field names are the keys of every per-field table
pub type FieldName = String;

/// Average field length used when the corpus has no statistic for a field
pub const DEFAULT_AVG_FIELD_LENGTH: f64 = 100.0;

/// Hard ceiling on segments: masks are 32-bit
pub const MAX_SEGMENT_BITS: u32 = 32;

// =============================================================================
// Field Parameters
// =============================================================================

/// Parameters for individual fields in BM25F scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldParams {
    /// Field weight
    pub weight: f64,
    /// Length normalization parameter b
    pub b: f64,
}

impl FieldParams {
    pub fn new(weight: f64, b: f64) -> Self {
        Self { weight, b }
    }
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            weight: 1.0,
            b: 0.75,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// ResoRank configuration with BM25F + Proximity + BMX + vector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResoRankConfig {
    /// BM25 k1 parameter (term saturation). Default: 1.2
    pub k1: f64,
    /// Global length normalization b. Default: 0.75
    pub b: f64,
    /// Strength of proximity boosting. Default: 0.5
    pub proximity_alpha: f64,
    /// Decay factor for document length in proximity calc. Default: 0.1
    pub proximity_decay_lambda: f64,
    /// How proximity is folded into the score. Default: idf-weighted
    pub proximity_strategy: ProximityStrategy,
    /// Number of positional segments in incoming masks (max 32). Default: 32
    pub max_segments: u32,
    /// Remap masks onto a document-length-derived segment count at index time
    pub use_adaptive_segments: bool,
    /// Full per-field overrides (weight and b)
    pub field_params: HashMap<FieldName, FieldParams>,
    /// Weight-only per-field table, consulted when `field_params` has no entry
    pub field_weights: HashMap<FieldName, f64>,
    /// Weight of the dense-vector score in the final blend. 0.0 = pure lexical
    pub vector_alpha: f64,
    /// IDF scaling factor for proximity weighting. Default: 5.0
    pub idf_proximity_scale: f64,
    /// Enable exact phrase detection boost. Default: true
    pub enable_phrase_boost: bool,
    /// Multiplier for phrase matches. Default: 1.5
    pub phrase_boost_multiplier: f64,

    // ===== BMX PARAMETERS =====
    /// Enable BMX entropy weighting in denominator. Default: false
    pub enable_bmx_entropy: bool,
    /// Enable BMX entropy-weighted similarity boost. Default: false
    pub enable_bmx_similarity: bool,
    /// Use adaptive alpha parameter instead of k1. Default: false
    pub use_adaptive_alpha: bool,
    /// Weight for entropy in denominator (gamma). If None, derived as alpha/2.
    pub entropy_denom_weight: Option<f64>,
    /// Capacity of the per-scorer entropy LRU. Default: 1000
    pub entropy_cache_size: usize,
}

impl Default for ResoRankConfig {
    fn default() -> Self {
        let mut field_weights = HashMap::new();
        field_weights.insert("title".to_string(), 2.0);
        field_weights.insert("content".to_string(), 1.0);

        Self {
            k1: 1.2,
            b: 0.75,
            proximity_alpha: 0.5,
            proximity_decay_lambda: 0.1,
            proximity_strategy: ProximityStrategy::IdfWeighted,
            max_segments: 32,
            use_adaptive_segments: false,
            field_params: HashMap::new(),
            field_weights,
            vector_alpha: 0.0,
            idf_proximity_scale: 5.0,
            enable_phrase_boost: true,
            phrase_boost_multiplier: 1.5,
            enable_bmx_entropy: false,
            enable_bmx_similarity: false,
            use_adaptive_alpha: false,
            entropy_denom_weight: None,
            entropy_cache_size: 1000,
        }
    }
}

impl ResoRankConfig {
    /// Production-optimized configuration
    pub fn production() -> Self {
        Self::default()
    }

    /// Full BMX integration preset
    pub fn bmx() -> Self {
        Self {
            enable_bmx_entropy: true,
            enable_bmx_similarity: true,
            use_adaptive_alpha: true,
            entropy_denom_weight: None,
            ..Self::default()
        }
    }

    /// BMX with entropy only (conservative adoption)
    pub fn bmx_entropy_only() -> Self {
        Self {
            enable_bmx_entropy: true,
            use_adaptive_alpha: true,
            enable_bmx_similarity: false,
            ..Self::default()
        }
    }

    /// Latency-optimized configuration (minimal features)
    pub fn latency() -> Self {
        Self {
            enable_phrase_boost: false,
            enable_bmx_entropy: false,
            enable_bmx_similarity: false,
            use_adaptive_alpha: false,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON config and validate it
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject structurally invalid configs.
    ///
    /// Numeric degeneracies such as `k1 <= 0` are allowed: the scoring math
    /// guards against them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_segments == 0 || self.max_segments > MAX_SEGMENT_BITS {
            warn!(max_segments = self.max_segments, "rejecting config");
            return Err(ConfigError::InvalidMaxSegments(self.max_segments));
        }

        if !(0.0..=1.0).contains(&self.vector_alpha) {
            warn!(vector_alpha = self.vector_alpha, "rejecting config");
            return Err(ConfigError::InvalidVectorAlpha(self.vector_alpha));
        }

        let scalars = [
            ("k1", self.k1),
            ("b", self.b),
            ("proximity_alpha", self.proximity_alpha),
            ("proximity_decay_lambda", self.proximity_decay_lambda),
            ("idf_proximity_scale", self.idf_proximity_scale),
            ("phrase_boost_multiplier", self.phrase_boost_multiplier),
            (
                "entropy_denom_weight",
                self.entropy_denom_weight.unwrap_or(0.0),
            ),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name: name.to_string(),
                    value,
                });
            }
        }

        for (field, params) in &self.field_params {
            if !params.weight.is_finite() || !params.b.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name: format!("field_params.{}", field),
                    value: if params.weight.is_finite() {
                        params.b
                    } else {
                        params.weight
                    },
                });
            }
        }

        Ok(())
    }

    /// Resolve weight and b for a field.
    ///
    /// Lookup order: `field_params`, then `field_weights` (with the global b),
    /// then weight 1.0 with the global b.
    pub fn field_params_for(&self, field: &str) -> FieldParams {
        if let Some(params) = self.field_params.get(field) {
            return *params;
        }

        let weight = self.field_weights.get(field).copied().unwrap_or(1.0);
        FieldParams { weight, b: self.b }
    }
}

// =============================================================================
// Corpus Statistics
// =============================================================================

/// Corpus-level statistics for BM25F scoring.
///
/// The scorer bumps `total_documents` on every index call but never recomputes
/// the averages; batch indexers push fresh averages via
/// `ResoRankScorer::update_corpus_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusStatistics {
    /// Total number of documents in corpus
    pub total_documents: usize,
    /// Average document length across all fields
    pub average_document_length: f64,
    /// Average field lengths (field -> avg_length)
    pub average_field_lengths: HashMap<FieldName, f64>,
}

impl Default for CorpusStatistics {
    fn default() -> Self {
        Self {
            total_documents: 0,
            average_document_length: 0.0,
            average_field_lengths: HashMap::new(),
        }
    }
}

impl CorpusStatistics {
    /// Average length for a field, falling back to [`DEFAULT_AVG_FIELD_LENGTH`]
    pub fn average_field_length(&self, field: &str) -> f64 {
        self.average_field_lengths
            .get(field)
            .copied()
            .unwrap_or(DEFAULT_AVG_FIELD_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResoRankConfig::default();
        assert_eq!(config.k1, 1.2);
        assert_eq!(config.b, 0.75);
        assert_eq!(config.max_segments, 32);
        assert_eq!(config.proximity_decay_lambda, 0.1);
        assert_eq!(config.proximity_strategy, ProximityStrategy::IdfWeighted);
        assert_eq!(config.vector_alpha, 0.0);
        assert_eq!(config.phrase_boost_multiplier, 1.5);
        assert_eq!(config.idf_proximity_scale, 5.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_field_params_fallback_chain() {
        let mut config = ResoRankConfig::default();
        config
            .field_params
            .insert("title".to_string(), FieldParams::new(10.0, 0.3));
        config.field_weights.insert("body".to_string(), 3.0);

        assert_eq!(config.field_params_for("title"), FieldParams::new(10.0, 0.3));
        assert_eq!(config.field_params_for("body"), FieldParams::new(3.0, 0.75));
        assert_eq!(config.field_params_for("unknown"), FieldParams::new(1.0, 0.75));
    }

    #[test]
    fn test_from_json_partial() {
        let config = ResoRankConfig::from_json(
            r#"{"k1": 2.0, "proximity_strategy": "per-term", "vector_alpha": 0.25}"#,
        )
        .unwrap();

        assert_eq!(config.k1, 2.0);
        assert_eq!(config.proximity_strategy, ProximityStrategy::PerTerm);
        assert_eq!(config.vector_alpha, 0.25);
        assert_eq!(config.max_segments, 32);
    }

    #[test]
    fn test_validate_rejects_bad_segments_and_alpha() {
        let config = ResoRankConfig {
            max_segments: 0,
            ..ResoRankConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxSegments(0))
        ));

        let config = ResoRankConfig {
            vector_alpha: 1.5,
            ..ResoRankConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVectorAlpha(_))
        ));

        assert!(matches!(
            ResoRankConfig::from_json("{\"max_segments\": 64}"),
            Err(ConfigError::InvalidMaxSegments(64))
        ));
        assert!(matches!(
            ResoRankConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_presets() {
        let bmx = ResoRankConfig::bmx();
        assert!(bmx.enable_bmx_entropy && bmx.enable_bmx_similarity && bmx.use_adaptive_alpha);

        let latency = ResoRankConfig::latency();
        assert!(!latency.enable_phrase_boost);
    }

    #[test]
    fn test_average_field_length_default() {
        let mut stats = CorpusStatistics::default();
        stats.average_field_lengths.insert("title".to_string(), 8.0);
        assert_eq!(stats.average_field_length("title"), 8.0);
        assert_eq!(stats.average_field_length("body"), DEFAULT_AVG_FIELD_LENGTH);
    }
}
