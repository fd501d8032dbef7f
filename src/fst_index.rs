//! Frozen postings tier backed by an FST term dictionary
//!
//! Terms map to byte offsets in a single postings blob; each offset marks the
//! start of that term's encoded block (see [`crate::codec`]). The structure is
//! immutable once built.

use fst::{Map, MapBuilder, Streamer};
use tracing::debug;

use crate::codec::{decode_postings, encode_postings};
use crate::error::IndexError;
use crate::types::Postings;

/// Immutable term -> postings index
pub struct FstIndex {
    /// FST mapping term bytes -> offset into `postings`
    terms: Map<Vec<u8>>,
    /// Concatenated encoded postings blocks, in term order
    postings: Vec<u8>,
}

impl FstIndex {
    /// Build from a complete token index.
    ///
    /// Terms are sorted here; duplicate terms make the FST builder fail.
    pub fn build<'a, I>(token_index: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (&'a str, &'a Postings)>,
    {
        let mut entries: Vec<(&str, &Postings)> = token_index.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut builder = MapBuilder::memory();
        let mut postings = Vec::new();

        for (term, term_postings) in entries {
            let offset = postings.len() as u64;
            encode_postings(term_postings, &mut postings)?;
            builder.insert(term.as_bytes(), offset)?;
        }

        let fst_bytes = builder.into_inner()?;
        let terms = Map::new(fst_bytes)?;

        debug!(
            terms = terms.len(),
            postings_bytes = postings.len(),
            "built frozen FST index"
        );

        Ok(Self { terms, postings })
    }

    /// Look up and decode the postings for a term.
    ///
    /// `Ok(None)` when the term is absent; `Err` when the stored block is corrupt.
    pub fn get(&self, term: &str) -> Result<Option<Postings>, IndexError> {
        let offset = match self.terms.get(term.as_bytes()) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start <= self.postings.len())
            .ok_or_else(|| IndexError::OffsetOutOfBounds {
                term: term.to_string(),
                offset,
            })?;

        let (postings, _) = decode_postings(&self.postings[start..])?;
        Ok(Some(postings))
    }

    /// Check if a term exists
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term.as_bytes())
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// All terms in lexicographic order
    pub fn terms(&self) -> Vec<String> {
        let mut results = Vec::with_capacity(self.terms.len());
        let mut stream = self.terms.stream();
        while let Some((key, _)) = stream.next() {
            if let Ok(term) = std::str::from_utf8(key) {
                results.push(term.to_string());
            }
        }
        results
    }

    /// Decode every term block, in term order
    pub fn entries(&self) -> Result<Vec<(String, Postings)>, IndexError> {
        let mut results = Vec::with_capacity(self.terms.len());
        for term in self.terms() {
            if let Some(postings) = self.get(&term)? {
                results.push((term, postings));
            }
        }
        Ok(results)
    }

    /// Bytes held by the transducer
    pub fn fst_bytes(&self) -> usize {
        self.terms.as_fst().as_bytes().len()
    }

    /// Bytes held by the postings blob
    pub fn postings_bytes(&self) -> usize {
        self.postings.len()
    }

    /// Release the transducer and postings blob
    pub fn close(self) {
        debug!(
            terms = self.terms.len(),
            bytes = self.fst_bytes() + self.postings_bytes(),
            "releasing frozen FST index"
        );
    }
}

#[cfg(test)]
impl FstIndex {
    /// Cut the postings blob short so lookups fail to decode
    pub(crate) fn truncate_postings(&mut self, len: usize) {
        self.postings.truncate(len);
    }
}

impl std::fmt::Debug for FstIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FstIndex")
            .field("terms", &self.terms.len())
            .field("fst_bytes", &self.fst_bytes())
            .field("postings_bytes", &self.postings.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
