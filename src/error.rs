//! Error types for ResoRank
//!
//! Scoring never fails: degenerate inputs fall back to neutral values.
//! Only configuration problems and frozen-index build/decode failures
//! surface as errors.

use thiserror::Error;

/// Errors raised while encoding or decoding a postings block
#[derive(Debug, Error)]
pub enum CodecError {
    /// Buffer ended before a complete value could be read
    #[error("Unexpected end of postings buffer while reading {context}")]
    UnexpectedEof {
        /// What was being decoded
        context: &'static str,
    },

    /// Varint did not terminate within the maximum encoded width
    #[error("Varint exceeds maximum length (possible corruption)")]
    VarintOverflow,

    /// Length-prefixed string was not valid UTF-8
    #[error("Invalid UTF-8 in {context}")]
    InvalidUtf8 {
        /// Which string was being decoded
        context: &'static str,
    },

    /// A declared length or count cannot fit in the remaining bytes
    #[error("Declared length {len} exceeds remaining {remaining} bytes")]
    LengthOutOfBounds {
        /// Declared length
        len: u64,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// Writer failure while encoding
    #[error("Encoding failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the frozen FST index
#[derive(Debug, Error)]
pub enum IndexError {
    /// Transducer construction or loading failed
    #[error("FST error: {0}")]
    Fst(#[from] fst::Error),

    /// Postings block could not be encoded or decoded
    #[error("Postings codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transducer pointed past the end of the postings blob
    #[error("Offset {offset} for term '{term}' is outside the postings blob")]
    OffsetOutOfBounds {
        /// Term whose offset was bad
        term: String,
        /// Recorded offset
        offset: u64,
    },
}

/// Configuration validation and loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_segments` must be in `1..=32`
    #[error("Invalid max_segments: {0} (must be between 1 and 32)")]
    InvalidMaxSegments(u32),

    /// `vector_alpha` must be in `[0, 1]`
    #[error("Invalid vector_alpha: {0} (must be between 0.0 and 1.0)")]
    InvalidVectorAlpha(f64),

    /// A numeric parameter was NaN or infinite
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Offending value
        value: f64,
    },

    /// JSON config could not be parsed
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for scorer operations
#[derive(Debug, Error)]
pub enum ResoRankError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<CodecError> for ResoRankError {
    fn from(err: CodecError) -> Self {
        ResoRankError::Index(IndexError::Codec(err))
    }
}

/// Result alias for scorer operations
pub type Result<T> = std::result::Result<T, ResoRankError>;
