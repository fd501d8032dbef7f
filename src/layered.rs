//! Two-tier postings index
//!
//! Recent writes land in a mutable overlay (`term -> doc -> metadata`). Compaction
//! freezes the effective view into an [`FstIndex`]. Reads merge per document:
//! an overlay entry for a doc replaces the frozen entry for that doc, other
//! frozen docs of the same term stay visible.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

use crate::error::IndexError;
use crate::fst_index::FstIndex;
use crate::types::{Postings, TokenMetadata};

/// Anything that can produce the effective postings of a term
pub trait PostingSource {
    /// Postings for `term`; empty when the term is unknown
    fn postings(&self, term: &str) -> Postings;
}

impl PostingSource for HashMap<String, Postings> {
    fn postings(&self, term: &str) -> Postings {
        self.get(term).cloned().unwrap_or_default()
    }
}

/// Mutable overlay over an optional frozen FST tier
#[derive(Debug, Default)]
pub struct LayeredIndex {
    mutable: HashMap<String, Postings>,
    frozen: Option<FstIndex>,
    /// Docs whose frozen entries are hidden until the next compaction
    tombstones: HashSet<String>,
}

impl LayeredIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write into the overlay, replacing any prior overlay entry for term/doc
    pub fn insert(&mut self, term: String, doc_id: &str, meta: TokenMetadata) {
        self.mutable
            .entry(term)
            .or_default()
            .insert(doc_id.to_string(), meta);
    }

    /// Remove a document from the overlay and hide it in the frozen tier
    pub fn remove_document(&mut self, doc_id: &str) {
        for docs in self.mutable.values_mut() {
            docs.remove(doc_id);
        }
        self.mutable.retain(|_, docs| !docs.is_empty());

        if self.frozen.is_some() {
            self.tombstones.insert(doc_id.to_string());
        }
    }

    /// Merged postings for a term, recomputed on every call.
    ///
    /// Errors only when the frozen block for the term is corrupt.
    pub fn try_postings(&self, term: &str) -> Result<Postings, IndexError> {
        let mut merged = match &self.frozen {
            Some(frozen) => frozen.get(term)?.unwrap_or_default(),
            None => Postings::new(),
        };

        if !self.tombstones.is_empty() {
            merged.retain(|doc_id, _| !self.tombstones.contains(doc_id));
        }

        if let Some(overlay) = self.mutable.get(term) {
            for (doc_id, meta) in overlay {
                merged.insert(doc_id.clone(), meta.clone());
            }
        }

        Ok(merged)
    }

    /// Effective metadata for one term/doc pair
    pub fn read(&self, term: &str, doc_id: &str) -> Result<Option<TokenMetadata>, IndexError> {
        if let Some(meta) = self.mutable.get(term).and_then(|docs| docs.get(doc_id)) {
            return Ok(Some(meta.clone()));
        }

        if self.tombstones.contains(doc_id) {
            return Ok(None);
        }

        match &self.frozen {
            Some(frozen) => Ok(frozen.get(term)?.and_then(|mut docs| docs.remove(doc_id))),
            None => Ok(None),
        }
    }

    /// True when compaction would change the frozen tier
    pub fn has_pending(&self) -> bool {
        !self.mutable.is_empty() || !self.tombstones.is_empty()
    }

    /// Freeze the effective view into a new FST tier.
    ///
    /// The replacement is built off to the side; on error the current frozen
    /// tier and the overlay are left untouched. Returns `false` when there was
    /// nothing to compact.
    pub fn compact(&mut self) -> Result<bool, IndexError> {
        if !self.has_pending() {
            return Ok(false);
        }

        let mut merged: BTreeMap<String, Postings> = BTreeMap::new();
        for term in self.terms() {
            let postings = self.try_postings(&term)?;
            if !postings.is_empty() {
                merged.insert(term, postings);
            }
        }

        let next = FstIndex::build(merged.iter().map(|(t, p)| (t.as_str(), p)))?;

        info!(
            overlay_terms = self.mutable.len(),
            tombstones = self.tombstones.len(),
            frozen_terms = next.len(),
            postings_bytes = next.postings_bytes(),
            "compacted postings overlay"
        );

        if let Some(previous) = self.frozen.replace(next) {
            previous.close();
        }
        self.mutable.clear();
        self.tombstones.clear();

        Ok(true)
    }

    /// Every term known to either tier, sorted and deduplicated.
    ///
    /// Terms whose postings were all tombstoned still appear until compaction.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.mutable.keys().cloned().collect();
        if let Some(frozen) = &self.frozen {
            terms.extend(frozen.terms());
        }
        terms.sort_unstable();
        terms.dedup();
        terms
    }

    /// Number of terms in the overlay
    pub fn mutable_term_count(&self) -> usize {
        self.mutable.len()
    }

    /// The frozen tier, if compaction has run
    pub fn frozen(&self) -> Option<&FstIndex> {
        self.frozen.as_ref()
    }
}

impl PostingSource for LayeredIndex {
    fn postings(&self, term: &str) -> Postings {
        match self.try_postings(term) {
            Ok(postings) => postings,
            Err(err) => {
                warn!(term, error = %err, "frozen postings unreadable; using overlay only");
                self.mutable.get(term).cloned().unwrap_or_default()
            }
        }
    }
}

impl Drop for LayeredIndex {
    fn drop(&mut self) {
        if let Some(frozen) = self.frozen.take() {
            frozen.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(df: usize, tf: u32, mask: u32) -> TokenMetadata {
        TokenMetadata::new(df)
            .with_segment_mask(mask)
            .with_field("body", tf, 100)
    }

    #[test]
    fn test_overlay_only() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(1, 1, 0b1));

        assert_eq!(index.try_postings("apple").unwrap().len(), 1);
        assert!(index.try_postings("pear").unwrap().is_empty());
        assert!(index.read("apple", "d1").unwrap().is_some());
        assert!(index.read("apple", "d2").unwrap().is_none());
    }

    #[test]
    fn test_compact_preserves_postings() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(2, 1, 0b1));
        index.insert("apple".to_string(), "d2", meta(2, 4, 0b110));
        index.insert("pear".to_string(), "d2", meta(1, 2, 0b10));

        let before_apple = index.try_postings("apple").unwrap();
        let before_pear = index.try_postings("pear").unwrap();

        assert!(index.compact().unwrap());
        assert_eq!(index.mutable_term_count(), 0);
        assert!(!index.has_pending());

        assert_eq!(index.try_postings("apple").unwrap(), before_apple);
        assert_eq!(index.try_postings("pear").unwrap(), before_pear);
        assert_eq!(index.frozen().map(|f| f.len()), Some(2));
    }

    #[test]
    fn test_compact_noop_when_clean() {
        let mut index = LayeredIndex::new();
        assert!(!index.compact().unwrap());
        assert!(index.frozen().is_none());
    }

    #[test]
    fn test_overlay_wins_per_document() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(2, 1, 0b1));
        index.insert("apple".to_string(), "d2", meta(2, 1, 0b1));
        index.compact().unwrap();

        index.insert("apple".to_string(), "d1", meta(2, 9, 0b100));

        let merged = index.try_postings("apple").unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["d1"].total_tf(), 9);
        assert_eq!(merged["d2"].total_tf(), 1);
        assert_eq!(index.read("apple", "d1").unwrap().unwrap().segment_mask, 0b100);
    }

    #[test]
    fn test_second_compaction_keeps_frozen_terms() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(1, 1, 0b1));
        index.compact().unwrap();

        index.insert("pear".to_string(), "d2", meta(1, 1, 0b1));
        index.compact().unwrap();

        assert_eq!(index.try_postings("apple").unwrap().len(), 1);
        assert_eq!(index.try_postings("pear").unwrap().len(), 1);

        index.insert("fig".to_string(), "d3", meta(1, 1, 0b1));
        assert_eq!(index.terms(), vec!["apple", "fig", "pear"]);
    }

    #[test]
    fn test_remove_hides_frozen_entries() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(2, 1, 0b1));
        index.insert("apple".to_string(), "d2", meta(2, 1, 0b1));
        index.compact().unwrap();

        index.remove_document("d1");
        assert!(index.has_pending());
        assert!(index.read("apple", "d1").unwrap().is_none());
        assert_eq!(index.try_postings("apple").unwrap().len(), 1);

        // Re-indexed docs are visible through the overlay despite the tombstone
        index.insert("apple".to_string(), "d1", meta(2, 3, 0b1));
        assert_eq!(index.try_postings("apple").unwrap().len(), 2);

        index.compact().unwrap();
        assert_eq!(index.try_postings("apple").unwrap()["d1"].total_tf(), 3);
    }

    #[test]
    fn test_failed_compaction_leaves_state_untouched() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(1, 1, 0b1));
        index.insert("pear".to_string(), "d2", meta(1, 1, 0b1));
        index.compact().unwrap();

        // "apple" sits at offset 0 and no longer decodes
        if let Some(frozen) = index.frozen.as_mut() {
            frozen.truncate_postings(1);
        }
        index.insert("fig".to_string(), "d3", meta(1, 2, 0b10));

        assert!(matches!(index.compact(), Err(IndexError::Codec(_))));
        assert_eq!(index.mutable_term_count(), 1);
        assert!(index.has_pending());
        assert_eq!(index.frozen().map(|f| f.len()), Some(2));
        assert_eq!(index.frozen().map(|f| f.postings_bytes()), Some(1));
        assert_eq!(index.read("fig", "d3").unwrap().unwrap().total_tf(), 2);

        // Reads on the scoring path fall back to the overlay
        assert_eq!(PostingSource::postings(&index, "fig").len(), 1);
        assert!(PostingSource::postings(&index, "apple").is_empty());
    }

    #[test]
    fn test_posting_source_merges_layers() {
        let mut index = LayeredIndex::new();
        index.insert("apple".to_string(), "d1", meta(2, 1, 0b1));
        index.compact().unwrap();
        index.insert("apple".to_string(), "d2", meta(2, 1, 0b1));

        assert_eq!(PostingSource::postings(&index, "apple").len(), 2);
    }
}
