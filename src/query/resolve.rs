use crate::config::EngineConfig;
use crate::index::CategoricalIndex;
use crate::query::filter::Predicate;
use crate::query::scan::{ScanMode, scan};
use crate::record::Record;
use roaring::RoaringBitmap;

/// Resolves normalized predicates to position sets
pub struct FilterResolver<'a> {
    records: &'a [Record],
    index: Option<&'a CategoricalIndex>,
    config: &'a EngineConfig,
    mode: ScanMode,
}

impl<'a> FilterResolver<'a> {
    pub fn new(
        records: &'a [Record],
        index: Option<&'a CategoricalIndex>,
        config: &'a EngineConfig,
        mode: ScanMode,
    ) -> Self {
        Self {
            records,
            index,
            config,
            mode,
        }
    }

    /// Positions satisfying a single predicate, restricted to `candidates`
    /// when given
    pub fn resolve(
        &self,
        predicate: &Predicate,
        candidates: Option<&RoaringBitmap>,
    ) -> RoaringBitmap {
        if let Predicate::Categorical { field, value } = predicate
            && let Some(index) = self.index
            && self.records.len() > self.config.categorical_index_threshold
            && index.has_field(*field)
        {
            match index.lookup(*field, value) {
                Some(hits) => {
                    return match candidates {
                        Some(c) => hits & c,
                        None => hits.clone(),
                    };
                }
                None => {
                    tracing::debug!(
                        target: "modelcat::filter",
                        field = field.name(),
                        value = %value,
                        "No index entry, scanning"
                    );
                }
            }
        }

        scan(self.records, candidates, self.mode, |record| {
            predicate.matches(record)
        })
    }

    /// One position set per predicate.
    ///
    /// Categorical predicates are resolved first against the whole dataset;
    /// range and hardware predicates then only scan the positions inside
    /// `within` (usually the search result) that survived them. The
    /// intersection of the returned sets is exact only inside `within`.
    pub fn resolve_all(
        &self,
        predicates: &[Predicate],
        within: Option<&RoaringBitmap>,
    ) -> Vec<RoaringBitmap> {
        let mut sets: Vec<RoaringBitmap> = predicates
            .iter()
            .filter(|p| p.is_categorical())
            .map(|p| self.resolve(p, None))
            .collect();

        let mut narrowed: Option<RoaringBitmap> = within.cloned();
        for set in &sets {
            narrowed = Some(match narrowed {
                Some(prev) => prev & set,
                None => set.clone(),
            });
        }

        for predicate in predicates.iter().filter(|p| !p.is_categorical()) {
            let set = self.resolve(predicate, narrowed.as_ref());
            narrowed = Some(set.clone());
            sets.push(set);
        }

        sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_indexes;
    use crate::query::filter::{Filter, FilterSpec};
    use crate::record::{CategoricalField, NumericField, synthetic_records};

    fn naive(records: &[Record], predicates: &[Predicate]) -> RoaringBitmap {
        (0..records.len() as u32)
            .filter(|&p| predicates.iter().all(|pred| pred.matches(&records[p as usize])))
            .collect()
    }

    fn intersection(sets: Vec<RoaringBitmap>) -> RoaringBitmap {
        crate::query::combine::intersect(sets, 0)
    }

    #[test]
    fn test_indexed_and_scanned_agree() {
        let records = synthetic_records(5_000, 9);
        let config = EngineConfig::default();
        let indexes = build_indexes(&records, &config);

        let predicates = FilterSpec::new()
            .with(Filter::categorical(CategoricalField::QuantFormat, "Q4_K_M"))
            .with(Filter::range(NumericField::DownloadCount, Some(1_000.0), None))
            .with(Filter::min_ram_gb(16.0))
            .normalize()
            .predicates;

        let indexed = FilterResolver::new(
            &records,
            Some(&indexes.categorical),
            &config,
            ScanMode::Blocking,
        );
        let scanned = FilterResolver::new(&records, None, &config, ScanMode::Parallel);

        let expected = naive(&records, &predicates);
        assert!(!expected.is_empty());
        assert_eq!(intersection(indexed.resolve_all(&predicates, None)), expected);
        assert_eq!(intersection(scanned.resolve_all(&predicates, None)), expected);
    }

    #[test]
    fn test_missing_index_entry_falls_back() {
        let records = synthetic_records(2_000, 4);
        let config = EngineConfig::default();
        let indexes = build_indexes(&records, &config);
        let resolver = FilterResolver::new(
            &records,
            Some(&indexes.categorical),
            &config,
            ScanMode::Blocking,
        );

        let predicate = Predicate::Categorical {
            field: CategoricalField::License,
            value: "gpl-3.0".to_string(),
        };
        assert!(resolver.resolve(&predicate, None).is_empty());
    }

    #[test]
    fn test_scans_stay_within_search_result() {
        let records = synthetic_records(3_000, 8);
        let config = EngineConfig::default();
        let resolver = FilterResolver::new(&records, None, &config, ScanMode::Blocking);
        let predicates = FilterSpec::new()
            .with(Filter::categorical(CategoricalField::License, "mit"))
            .with(Filter::range(NumericField::LikeCount, Some(100.0), None))
            .normalize()
            .predicates;
        let within: RoaringBitmap = (0..1_000).collect();

        let sets = resolver.resolve_all(&predicates, Some(&within));
        let range_set = sets.last().unwrap();
        assert!(range_set.max().is_none_or(|p| p < 1_000));

        let expected = naive(&records, &predicates) & &within;
        assert!(!expected.is_empty());
        assert_eq!(intersection(sets) & &within, expected);
    }

    #[test]
    fn test_no_predicates() {
        let records = synthetic_records(10, 1);
        let config = EngineConfig::default();
        let resolver = FilterResolver::new(&records, None, &config, ScanMode::Blocking);
        assert!(resolver.resolve_all(&[], None).is_empty());
    }
}
