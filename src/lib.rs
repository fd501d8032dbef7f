//! ResoRank: hybrid lexical + vector ranking
//!
//! BM25F scoring with segment-mask proximity, BMX entropy extensions and an
//! optional dense-vector blend, served from a two-tier postings index whose
//! frozen tier is an FST term dictionary over a varint-encoded postings blob.
//!
//! # Architecture
//! - `config.rs` - Configuration types, presets and validation
//! - `types.rs` - Core data structures (TokenMetadata, DocumentMetadata, etc.)
//! - `math.rs` - Math utilities (IDF, TF normalization, saturation, cosine)
//! - `proximity.rs` - Proximity strategies (Global, PerTerm, Pairwise, IdfWeighted)
//! - `entropy.rs` - BMX entropy calculations and caching
//! - `codec.rs` - Binary postings block encoding
//! - `fst_index.rs` - Frozen FST-backed postings tier
//! - `layered.rs` - Mutable overlay + frozen tier, compaction
//! - `scorer.rs` - Main ResoRankScorer implementation
//! - `wasm.rs` - JavaScript bindings
//!
//! # Usage (Rust)
//! ```
//! use std::collections::HashMap;
//! use resorank_hybrid::{DocumentMetadata, ResoRankConfig, ResoRankScorer, TokenMetadata};
//!
//! let mut scorer = ResoRankScorer::new(ResoRankConfig::default());
//! let mut tokens = HashMap::new();
//! tokens.insert(
//!     "apple".to_string(),
//!     TokenMetadata::new(1).with_field("content", 2, 40).with_segment_mask(0b1),
//! );
//! scorer.index_document("doc1", DocumentMetadata::new(), tokens);
//!
//! let results = scorer.search(&["apple".to_string()], None, 10);
//! assert_eq!(results[0].doc_id, "doc1");
//! ```
//!
//! # Usage (WASM)
//! ```javascript
//! import init, { ResoRankScorer } from 'resorank-hybrid';
//!
//! await init();
//! const scorer = new ResoRankScorer(config, corpusStats);
//! scorer.indexDocument(docId, docMeta, tokens);
//! const results = scorer.search(query, queryVector, 10);
//! ```

mod codec;
mod config;
mod entropy;
mod error;
mod fst_index;
mod layered;
mod math;
mod proximity;
mod scorer;
mod types;
mod wasm;

#[cfg(test)]
mod tests;

pub use codec::*;
pub use config::*;
pub use entropy::*;
pub use error::{CodecError, ConfigError, IndexError, ResoRankError, Result};
pub use fst_index::*;
pub use layered::*;
pub use math::*;
pub use proximity::*;
pub use scorer::*;
pub use types::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Crate version, for hosts checking which build they loaded
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
