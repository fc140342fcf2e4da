//! The catalog engine: one dataset snapshot plus everything derived from it.
//!
//! [`CatalogEngine::apply_query`] runs search, filter, combine and sort,
//! consulting the cache tiers at each stage. Indexes and caches form one
//! generation; loading a dataset or calling
//! [`clear_caches`](CatalogEngine::clear_caches) discards both together.

mod result;

pub use result::{Diagnostics, QueryCounts, QueryResult};

use crate::cache::{CacheManager, CompositeEntry};
use crate::config::{EngineConfig, HardwareConfig};
use crate::error::{CatalogError, Result};
use crate::index::{Indexes, build_indexes};
use crate::query::combine::{full, intersect};
use crate::query::{
    CatalogQuery, FilterResolver, PreparedQuery, ScanMode, SearchResolver, sort_positions,
};
use crate::record::{LoadReport, Position, Record, load_dataset};
use roaring::RoaringBitmap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Largest dataset addressable by a [`Position`]
const MAX_RECORDS: usize = Position::MAX as usize;

pub struct CatalogEngine {
    config: EngineConfig,
    records: Option<Arc<[Record]>>,
    generation: u64,
    indexes: Option<Arc<Indexes>>,
    caches: CacheManager,
    cooperative_batch: Option<usize>,
}

impl CatalogEngine {
    pub fn new(config: EngineConfig) -> Self {
        let caches = CacheManager::new(config.cache_capacity);
        Self {
            config,
            records: None,
            generation: 0,
            indexes: None,
            caches,
            cooperative_batch: None,
        }
    }

    pub fn with_records(records: Vec<Record>, config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        engine.load(records);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the dataset
    pub fn load(&mut self, mut records: Vec<Record>) {
        if records.len() > MAX_RECORDS {
            tracing::warn!(
                target: "modelcat::engine",
                records = records.len(),
                kept = MAX_RECORDS,
                "Dataset too large, truncating"
            );
            records.truncate(MAX_RECORDS);
        }
        self.load_shared(Arc::from(records));
    }

    /// Replace the dataset with a shared snapshot
    pub fn load_shared(&mut self, records: Arc<[Record]>) {
        let records = if records.len() > MAX_RECORDS {
            tracing::warn!(
                target: "modelcat::engine",
                records = records.len(),
                kept = MAX_RECORDS,
                "Dataset too large, truncating"
            );
            Arc::from(&records[..MAX_RECORDS])
        } else {
            records
        };

        tracing::info!(
            target: "modelcat::engine",
            records = records.len(),
            generation = self.generation + 1,
            "Dataset loaded"
        );
        self.records = Some(records);
        self.clear_caches();
    }

    /// Load a dataset file, replacing the current dataset. The returned
    /// report carries the counts; its records have moved into the engine.
    pub fn load_file(&mut self, path: &Path, hardware: &HardwareConfig) -> Result<LoadReport> {
        let mut report =
            load_dataset(path, hardware).map_err(|e| CatalogError::Dataset(format!("{e:#}")))?;
        self.load(std::mem::take(&mut report.records));
        Ok(report)
    }

    pub fn records(&self) -> Option<&Arc<[Record]>> {
        self.records.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_indexed(&self) -> bool {
        self.indexes.is_some()
    }

    pub fn indexes(&self) -> Option<&Indexes> {
        self.indexes.as_deref()
    }

    /// Build (or rebuild) the search and categorical indexes now
    pub fn build_indexes(&mut self) -> Result<()> {
        let records = self.records.as_ref().ok_or(CatalogError::NoDataset)?;
        self.indexes = Some(Arc::new(build_indexes(records, &self.config)));
        Ok(())
    }

    /// Drop every cache tier and the indexes, starting a new generation
    pub fn clear_caches(&mut self) {
        self.caches.clear();
        self.indexes = None;
        self.generation += 1;
        tracing::debug!(
            target: "modelcat::engine",
            generation = self.generation,
            "Caches cleared"
        );
    }

    /// Scan on the calling thread in batches of `batch` records, yielding
    /// between them. `None` restores the default blocking or parallel scans.
    pub fn set_cooperative(&mut self, batch: Option<usize>) {
        self.cooperative_batch = batch.map(|b| b.max(1));
    }

    /// Run a query against the loaded dataset
    pub fn apply_query(&mut self, query: &CatalogQuery) -> Result<QueryResult> {
        let start = Instant::now();
        let records = self.records.clone().ok_or(CatalogError::NoDataset)?;
        let total = records.len();

        // Debug keeps NaN bounds distinct from absent ones
        let raw_key = format!("{total}\x1f{query:?}");
        if let Some(hit) = self.caches.composite.get(&raw_key) {
            return Ok(QueryResult::new(
                records,
                hit.positions,
                true,
                hit.warnings.to_vec(),
                start.elapsed(),
            ));
        }

        let prepared = query.prepare();
        for warning in &prepared.filters.warnings {
            tracing::warn!(target: "modelcat::filter", %warning, "Recovered invalid filter input");
        }

        let (positions, from_cache) = self.ordered_positions(&records, &prepared);
        let warnings: Arc<[_]> = Arc::from(prepared.filters.warnings.clone());
        self.caches.composite.put(
            raw_key,
            CompositeEntry {
                positions: positions.clone(),
                warnings,
            },
        );

        let result = QueryResult::new(
            records,
            positions,
            from_cache,
            prepared.filters.warnings,
            start.elapsed(),
        );
        tracing::debug!(
            target: "modelcat::engine",
            total = result.counts.total,
            filtered = result.counts.filtered,
            from_cache,
            elapsed_ms = result.elapsed.as_secs_f64() * 1000.0,
            "Query applied"
        );
        Ok(result)
    }

    /// Run a query against `records`, loading them first unless they are the
    /// snapshot already held
    pub fn apply_query_to(
        &mut self,
        records: &Arc<[Record]>,
        query: &CatalogQuery,
    ) -> Result<QueryResult> {
        let same = self
            .records
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, records));
        if !same {
            self.load_shared(records.clone());
        }
        self.apply_query(query)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            dataset_len: self.records.as_ref().map(|r| r.len()),
            generation: self.generation,
            indexed: self.indexes.is_some(),
            index_tokens: self.indexes.as_ref().map_or(0, |i| i.search.len()),
            caches: self.caches.sizes(),
            cooperative_batch: self.cooperative_batch,
            thresholds: self.config.clone(),
        }
    }

    fn ordered_positions(
        &mut self,
        records: &Arc<[Record]>,
        prepared: &PreparedQuery,
    ) -> (Arc<[Position]>, bool) {
        let total = records.len();
        let full_key = prepared.key(total);
        if let Some(hit) = self.caches.sorted.get(&full_key) {
            return (hit, true);
        }

        let candidates = self.candidates(records, prepared);
        let parallel = self.cooperative_batch.is_none()
            && candidates.len() as usize > self.config.parallel_threshold;
        let sorted: Arc<[Position]> = Arc::from(sort_positions(
            records,
            &candidates,
            prepared.sorting.as_ref(),
            parallel,
        ));

        self.caches.sorted.put(full_key, sorted.clone());
        (sorted, false)
    }

    fn candidates(&mut self, records: &[Record], prepared: &PreparedQuery) -> RoaringBitmap {
        let total = records.len();
        self.ensure_indexes(records);
        let mode = self.scan_mode(total);
        let indexes = self.indexes.clone();

        let search = if prepared.words.is_empty() {
            None
        } else {
            let key = prepared.search_key(total);
            match self.caches.search.get(&key) {
                Some(hit) => Some(hit),
                None => {
                    let resolver = SearchResolver::new(
                        records,
                        indexes.as_deref().map(|i| &i.search),
                        &self.config,
                        mode,
                    );
                    let hits = Arc::new(resolver.resolve(&prepared.words).unwrap_or_default());
                    self.caches.search.put(key, hits.clone());
                    Some(hits)
                }
            }
        };

        let filtered = if prepared.filters.is_empty() {
            None
        } else {
            let key = prepared.filter_key(total);
            match self.caches.filter.get(&key) {
                Some(hit) => Some(hit),
                None => {
                    let resolver = FilterResolver::new(
                        records,
                        indexes.as_deref().map(|i| &i.categorical),
                        &self.config,
                        mode,
                    );
                    let within = if prepared.filters_scoped_to_search() {
                        search.as_deref()
                    } else {
                        None
                    };
                    let sets = resolver.resolve_all(&prepared.filters.predicates, within);
                    let hits = Arc::new(intersect(sets, total as Position));
                    self.caches.filter.put(key, hits.clone());
                    Some(hits)
                }
            }
        };

        match (search, filtered) {
            (None, None) => full(total as Position),
            (Some(only), None) | (None, Some(only)) => {
                Arc::try_unwrap(only).unwrap_or_else(|shared| (*shared).clone())
            }
            (Some(a), Some(b)) => a.as_ref() & b.as_ref(),
        }
    }

    fn ensure_indexes(&mut self, records: &[Record]) {
        let worthwhile = records.len()
            > self
                .config
                .index_threshold
                .min(self.config.categorical_index_threshold);
        if worthwhile && self.indexes.is_none() {
            self.indexes = Some(Arc::new(build_indexes(records, &self.config)));
        }
    }

    fn scan_mode(&self, total: usize) -> ScanMode {
        match self.cooperative_batch {
            Some(batch) => ScanMode::Cooperative { batch },
            None if total > self.config.parallel_threshold => ScanMode::Parallel,
            None => ScanMode::Blocking,
        }
    }
}

impl Default for CatalogEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, SortField, SortSpec};
    use crate::record::{CategoricalField, NumericField, synthetic_records};

    #[test]
    fn test_no_dataset() {
        let mut engine = CatalogEngine::default();
        let err = engine.apply_query(&CatalogQuery::new()).unwrap_err();
        assert!(matches!(err, CatalogError::NoDataset));
        assert!(matches!(engine.build_indexes(), Err(CatalogError::NoDataset)));
    }

    #[test]
    fn test_empty_dataset() {
        let mut engine = CatalogEngine::with_records(Vec::new(), EngineConfig::default());
        let result = engine
            .apply_query(&CatalogQuery::new().search("llama"))
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.counts, QueryCounts::new(0, 0));
    }

    #[test]
    fn test_unconstrained_query_returns_all_in_order() {
        let mut engine = CatalogEngine::with_records(synthetic_records(50, 1), EngineConfig::default());
        let result = engine.apply_query(&CatalogQuery::new()).unwrap();
        assert_eq!(result.positions(), (0..50).collect::<Vec<_>>().as_slice());
        assert_eq!(result.counts.removed, 0);
    }

    #[test]
    fn test_cache_hit_and_clear() {
        let mut engine =
            CatalogEngine::with_records(synthetic_records(3_000, 2), EngineConfig::default());
        let query = CatalogQuery::new()
            .search("chat")
            .filter(Filter::categorical(CategoricalField::License, "mit"))
            .sort(SortSpec::desc(SortField::DownloadCount));

        let first = engine.apply_query(&query).unwrap();
        assert!(!first.from_cache);
        assert!(engine.is_indexed());

        let second = engine.apply_query(&query).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.positions(), second.positions());

        let generation = engine.generation();
        engine.clear_caches();
        assert!(!engine.is_indexed());
        assert_eq!(engine.generation(), generation + 1);

        let third = engine.apply_query(&query).unwrap();
        assert!(!third.from_cache);
        assert_eq!(first.positions(), third.positions());
    }

    #[test]
    fn test_equivalent_queries_share_sorted_tier() {
        let mut engine = CatalogEngine::with_records(synthetic_records(500, 3), EngineConfig::default());
        let a = CatalogQuery::new().search("Llama chat");
        let b = CatalogQuery::new()
            .search("chat  llama")
            .filter(Filter::categorical(CategoricalField::QuantFormat, "all"));

        let first = engine.apply_query(&a).unwrap();
        let second = engine.apply_query(&b).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.positions(), second.positions());
    }

    #[test]
    fn test_warnings_are_returned() {
        let mut engine = CatalogEngine::with_records(synthetic_records(20, 4), EngineConfig::default());
        let query = CatalogQuery::new().filter(Filter::range(
            NumericField::LikeCount,
            Some(f64::NAN),
            None,
        ));
        let result = engine.apply_query(&query).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.len(), 20);
    }

    #[test]
    fn test_apply_query_to_reloads_on_new_snapshot() {
        let mut engine = CatalogEngine::default();
        let a: Arc<[Record]> = Arc::from(synthetic_records(10, 5));
        let b: Arc<[Record]> = Arc::from(synthetic_records(12, 6));

        engine.apply_query_to(&a, &CatalogQuery::new()).unwrap();
        let generation = engine.generation();
        engine.apply_query_to(&a, &CatalogQuery::new()).unwrap();
        assert_eq!(engine.generation(), generation);

        let result = engine.apply_query_to(&b, &CatalogQuery::new()).unwrap();
        assert_eq!(result.counts.total, 12);
        assert!(engine.generation() > generation);
    }

    #[test]
    fn test_cooperative_matches_default() {
        let records = synthetic_records(4_000, 7);
        let query = CatalogQuery::new()
            .search("instruct")
            .filter(Filter::range(NumericField::LikeCount, Some(100.0), Some(4_000.0)))
            .filter(Filter::min_cpu_cores(8.0))
            .sort(SortSpec::asc(SortField::ModelName));

        let mut plain = CatalogEngine::with_records(records.clone(), EngineConfig::default());
        let mut cooperative = CatalogEngine::with_records(records, EngineConfig::default());
        cooperative.set_cooperative(Some(333));

        let expected = plain.apply_query(&query).unwrap();
        let actual = cooperative.apply_query(&query).unwrap();
        assert_eq!(expected.positions(), actual.positions());
        assert_eq!(cooperative.diagnostics().cooperative_batch, Some(333));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(&path, r#"[{"modelName": "Phi 3B"}, "junk"]"#).unwrap();

        let mut engine = CatalogEngine::default();
        let report = engine.load_file(&path, &HardwareConfig::default()).unwrap();
        assert_eq!((report.loaded, report.skipped), (1, 1));
        assert_eq!(engine.records().map(|r| r.len()), Some(1));

        let missing = engine.load_file(&dir.path().join("absent.json"), &HardwareConfig::default());
        assert!(matches!(missing, Err(CatalogError::Dataset(_))));
    }

    #[test]
    fn test_diagnostics() {
        let mut engine = CatalogEngine::with_records(synthetic_records(100, 8), EngineConfig::default());
        assert!(!engine.diagnostics().indexed);
        engine.build_indexes().unwrap();
        engine.apply_query(&CatalogQuery::new().search("qwen")).unwrap();

        let diagnostics = engine.diagnostics();
        assert_eq!(diagnostics.dataset_len, Some(100));
        assert!(diagnostics.indexed);
        assert!(diagnostics.index_tokens > 0);
        assert_eq!(diagnostics.caches.composite.entries, 1);
        assert_eq!(diagnostics.thresholds.index_threshold, 1_000);
    }
}
