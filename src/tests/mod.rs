//! End-to-end scenarios against the public scorer API

mod ranking_tests;

use std::collections::HashMap;

use crate::types::TokenMetadata;

pub(crate) fn query(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

pub(crate) fn single_token(
    term: &str,
    meta: TokenMetadata,
) -> HashMap<String, TokenMetadata> {
    let mut tokens = HashMap::new();
    tokens.insert(term.to_string(), meta);
    tokens
}
