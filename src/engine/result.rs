use crate::cache::CacheSizes;
use crate::config::EngineConfig;
use crate::query::FilterWarning;
use crate::record::{Position, Record};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Summary counts of a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryCounts {
    /// Records in the dataset
    pub total: usize,
    /// Records in the result
    pub filtered: usize,
    /// Records excluded by the query
    pub removed: usize,
}

impl QueryCounts {
    pub fn new(total: usize, filtered: usize) -> Self {
        Self {
            total,
            filtered,
            removed: total.saturating_sub(filtered),
        }
    }
}

/// Ordered result of a query.
///
/// Holds positions into the dataset snapshot it was computed from, so
/// records are only copied on [`QueryResult::to_records`].
#[derive(Debug, Clone)]
pub struct QueryResult {
    records: Arc<[Record]>,
    positions: Arc<[Position]>,
    pub counts: QueryCounts,
    /// Ordering came from a cache rather than being recomputed
    pub from_cache: bool,
    pub warnings: Vec<FilterWarning>,
    pub elapsed: Duration,
}

impl QueryResult {
    pub(crate) fn new(
        records: Arc<[Record]>,
        positions: Arc<[Position]>,
        from_cache: bool,
        warnings: Vec<FilterWarning>,
        elapsed: Duration,
    ) -> Self {
        let counts = QueryCounts::new(records.len(), positions.len());
        Self {
            records,
            positions,
            counts,
            from_cache,
            warnings,
            elapsed,
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Matching records in result order
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.positions
            .iter()
            .filter_map(|&p| self.records.get(p as usize))
    }

    /// Materialize the matching records
    pub fn to_records(&self) -> Vec<Record> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The dataset snapshot the positions refer to
    pub fn dataset(&self) -> &Arc<[Record]> {
        &self.records
    }
}

/// Engine state for debug tooling
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub dataset_len: Option<usize>,
    pub generation: u64,
    pub indexed: bool,
    pub index_tokens: usize,
    pub caches: CacheSizes,
    pub cooperative_batch: Option<usize>,
    pub thresholds: EngineConfig,
}
