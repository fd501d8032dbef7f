//! JavaScript bindings for [`ResoRankScorer`]
//!
//! Plain objects cross the boundary through `serde_wasm_bindgen`; query vectors
//! arrive as `Float32Array`.

use js_sys::Float32Array;
use serde::Serialize;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

use crate::config::{CorpusStatistics, ResoRankConfig};
use crate::error::ResoRankError;
use crate::scorer::ResoRankScorer;
use crate::types::{DocumentMetadata, SearchOptions, TokenMetadata};

fn to_js_error(err: ResoRankError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn is_missing(val: &JsValue) -> bool {
    val.is_undefined() || val.is_null()
}

/// Maps become plain objects so hosts can index results directly
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

fn parse_query(query_val: JsValue) -> Result<Vec<String>, JsValue> {
    Ok(serde_wasm_bindgen::from_value(query_val)?)
}

#[wasm_bindgen]
impl ResoRankScorer {
    /// Create a validated scorer from JS objects; either may be omitted
    #[wasm_bindgen(constructor)]
    pub fn js_new(
        config_val: JsValue,
        corpus_stats_val: JsValue,
    ) -> Result<ResoRankScorer, JsValue> {
        let config: ResoRankConfig = if is_missing(&config_val) {
            ResoRankConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config_val)?
        };

        let corpus_stats: CorpusStatistics = if is_missing(&corpus_stats_val) {
            CorpusStatistics::default()
        } else {
            serde_wasm_bindgen::from_value(corpus_stats_val)?
        };

        ResoRankScorer::try_new(config, corpus_stats).map_err(to_js_error)
    }

    /// Index a document (accepts JS objects)
    #[wasm_bindgen(js_name = indexDocument)]
    pub fn js_index_document(
        &mut self,
        doc_id: &str,
        doc_meta_val: JsValue,
        tokens_val: JsValue,
    ) -> Result<(), JsValue> {
        let doc_meta: DocumentMetadata = serde_wasm_bindgen::from_value(doc_meta_val)?;
        let tokens: HashMap<String, TokenMetadata> = serde_wasm_bindgen::from_value(tokens_val)?;

        self.index_document(doc_id, doc_meta, tokens);
        Ok(())
    }

    #[wasm_bindgen(js_name = removeDocument)]
    pub fn js_remove_document(&mut self, doc_id: &str) -> bool {
        self.remove_document(doc_id)
    }

    /// Search (array of strings in, array of SearchResult out)
    #[wasm_bindgen(js_name = search)]
    pub fn js_search(
        &mut self,
        query_val: JsValue,
        query_vector: Option<Float32Array>,
        limit: usize,
    ) -> Result<JsValue, JsValue> {
        let query = parse_query(query_val)?;
        let vector = query_vector.map(|v| v.to_vec());

        let results = self.search(&query, vector.as_deref(), limit);
        to_js(&results)
    }

    /// Search with `{ limit, normalize, scope }`
    #[wasm_bindgen(js_name = searchWithOptions)]
    pub fn js_search_with_options(
        &mut self,
        query_val: JsValue,
        query_vector: Option<Float32Array>,
        options_val: JsValue,
    ) -> Result<JsValue, JsValue> {
        let query = parse_query(query_val)?;
        let vector = query_vector.map(|v| v.to_vec());
        let options: SearchOptions = if is_missing(&options_val) {
            SearchOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options_val)?
        };

        let results = self.search_with_options(&query, vector.as_deref(), &options);
        to_js(&results)
    }

    #[wasm_bindgen(js_name = score)]
    pub fn js_score(
        &mut self,
        query_val: JsValue,
        query_vector: Option<Float32Array>,
        doc_id: &str,
    ) -> Result<f64, JsValue> {
        let query = parse_query(query_val)?;
        let vector = query_vector.map(|v| v.to_vec());
        Ok(self.score(&query, vector.as_deref(), doc_id))
    }

    /// Score and explain (returns ScoreExplanation)
    #[wasm_bindgen(js_name = explainScore)]
    pub fn js_explain_score(
        &mut self,
        query_val: JsValue,
        query_vector: Option<Float32Array>,
        doc_id: &str,
    ) -> Result<JsValue, JsValue> {
        let query = parse_query(query_val)?;
        let vector = query_vector.map(|v| v.to_vec());

        let explanation = self.explain_score(&query, vector.as_deref(), doc_id);
        to_js(&explanation)
    }

    #[wasm_bindgen(js_name = compact)]
    pub fn js_compact(&mut self) -> Result<(), JsValue> {
        self.compact().map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = updateCorpusStatistics)]
    pub fn js_update_corpus_statistics(&mut self, stats_val: JsValue) -> Result<(), JsValue> {
        let stats: CorpusStatistics = serde_wasm_bindgen::from_value(stats_val)?;
        self.update_corpus_statistics(stats);
        Ok(())
    }

    #[wasm_bindgen(js_name = corpusStatistics)]
    pub fn js_corpus_statistics(&self) -> Result<JsValue, JsValue> {
        to_js(self.corpus_statistics())
    }

    #[wasm_bindgen(js_name = warmIdfCache)]
    pub fn js_warm_idf_cache(&mut self) {
        self.warm_idf_cache();
    }

    #[wasm_bindgen(js_name = clearCaches)]
    pub fn js_clear_caches(&mut self) {
        self.clear_idf_cache();
        self.clear_entropy_cache();
    }

    #[wasm_bindgen(js_name = stats)]
    pub fn js_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.stats())
    }
}
