use crate::record::{CategoricalField, Position};
use rayon::prelude::*;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;

/// Inverted search index: normalized token to the positions containing it.
///
/// Entries are kept sorted by token so iteration order, and therefore every
/// derived result, is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<(String, RoaringBitmap)>,
}

impl SearchIndex {
    pub(crate) fn from_sorted(entries: Vec<(String, RoaringBitmap)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self { entries }
    }

    /// Number of distinct tokens
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positions registered under exactly this token
    pub fn get(&self, token: &str) -> Option<&RoaringBitmap> {
        self.entries
            .binary_search_by(|(t, _)| t.as_str().cmp(token))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    /// Union of the postings of every token containing `word` as a substring
    pub fn matching(&self, word: &str, parallel: bool) -> RoaringBitmap {
        if parallel {
            self.entries
                .par_iter()
                .filter(|(token, _)| token.contains(word))
                .fold(RoaringBitmap::new, |mut acc, (_, postings)| {
                    acc |= postings;
                    acc
                })
                .reduce(RoaringBitmap::new, |a, b| a | b)
        } else {
            let mut acc = RoaringBitmap::new();
            for (_, postings) in self.entries.iter().filter(|(t, _)| t.contains(word)) {
                acc |= postings;
            }
            acc
        }
    }

    /// Iterate tokens in sorted order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }
}

/// Equality indexes for the categorical fields
#[derive(Debug, Clone, Default)]
pub struct CategoricalIndex {
    fields: FxHashMap<CategoricalField, FxHashMap<String, RoaringBitmap>>,
}

impl CategoricalIndex {
    pub(crate) fn insert(&mut self, field: CategoricalField, value: &str, pos: Position) {
        let key = normalize_value(value);
        if key.is_empty() {
            return;
        }
        self.fields
            .entry(field)
            .or_default()
            .entry(key)
            .or_default()
            .insert(pos);
    }

    /// Positions whose `field` equals an already-normalized value
    pub fn lookup(&self, field: CategoricalField, normalized: &str) -> Option<&RoaringBitmap> {
        self.fields.get(&field)?.get(normalized)
    }

    pub fn has_field(&self, field: CategoricalField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Distinct values seen for a field
    pub fn value_count(&self, field: CategoricalField) -> usize {
        self.fields.get(&field).map(|values| values.len()).unwrap_or(0)
    }

    /// Distinct normalized values for a field, sorted
    pub fn values(&self, field: CategoricalField) -> Vec<&str> {
        let mut values: Vec<&str> = self
            .fields
            .get(&field)
            .map(|v| v.keys().map(String::as_str).collect())
            .unwrap_or_default();
        values.sort_unstable();
        values
    }
}

/// All indexes derived from one dataset snapshot
#[derive(Debug, Clone, Default)]
pub struct Indexes {
    pub search: SearchIndex,
    pub categorical: CategoricalIndex,
    /// Length of the dataset the indexes were built from
    pub record_count: usize,
}

/// Normalized form used for categorical keys and comparisons
pub fn normalize_value(value: &str) -> String {
    value.trim().to_lowercase()
}
