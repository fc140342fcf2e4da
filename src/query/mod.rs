//! Query model and the resolution pipeline stages.
//!
//! A [`CatalogQuery`] (search text, filters, sort) is prepared once into a
//! [`PreparedQuery`], then resolved in stages:
//!
//! - [`search`] - free-text words to positions
//! - [`resolve`] - predicates to positions
//! - [`combine`] - intersection of the stage outputs
//! - [`sort`] - stable ordering of the candidates
//!
//! [`parser`] turns a compact query string into a [`CatalogQuery`].

pub mod combine;
pub mod filter;
pub mod parser;
pub mod resolve;
pub mod scan;
pub mod search;
pub mod sort;

pub use filter::{
    ALL_VALUES, Bound, Filter, FilterSpec, FilterWarning, GpuRequirement, NormalizedFilters,
    Predicate,
};
pub use parser::{ParsedQuery, parse_query};
pub use resolve::FilterResolver;
pub use scan::ScanMode;
pub use search::SearchResolver;
pub use sort::{Direction, SortField, SortKey, SortSpec, sort_positions};

use crate::utils::query_words;
use serde::{Deserialize, Serialize};

/// Parameters of one catalog query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub filters: FilterSpec,
    #[serde(default)]
    pub sorting: Option<SortSpec>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_query = text.into();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sorting = Some(spec);
        self
    }

    /// Normalize words and filters
    pub fn prepare(&self) -> PreparedQuery {
        PreparedQuery {
            words: query_words(&self.search_query),
            filters: self.filters.normalize(),
            sorting: self.sorting,
        }
    }
}

/// A query in canonical form, ready for resolution and cache keying.
///
/// Key components are joined with the ASCII unit separator.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub words: Vec<String>,
    pub filters: NormalizedFilters,
    pub sorting: Option<SortSpec>,
}

impl PreparedQuery {
    /// Cache key for the search stage
    pub fn search_key(&self, total: usize) -> String {
        format!("{total}\x1f{}", self.words.join(" "))
    }

    /// Cache key for the combined filter stage. Scoped filter results also
    /// depend on the search words.
    pub fn filter_key(&self, total: usize) -> String {
        if self.filters_scoped_to_search() {
            format!("{total}\x1f{}\x1f{}", self.filters.key(), self.words.join(" "))
        } else {
            format!("{total}\x1f{}", self.filters.key())
        }
    }

    /// Whether range and hardware predicates should only be scanned inside
    /// the search result
    pub fn filters_scoped_to_search(&self) -> bool {
        !self.words.is_empty() && self.filters.predicates.iter().any(|p| !p.is_categorical())
    }

    /// Key identifying the whole logical query. Word order is irrelevant
    /// under AND semantics, so words are sorted.
    pub fn key(&self, total: usize) -> String {
        let mut words = self.words.clone();
        words.sort_unstable();
        let sort = self
            .sorting
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "{total}\x1f{}\x1f{}\x1f{sort}",
            words.join(" "),
            self.filters.key()
        )
    }
}
