use crate::config::EngineConfig;
use crate::index::types::{CategoricalIndex, Indexes, SearchIndex};
use crate::record::{CategoricalField, Position, Record, TextField};
use crate::utils::index_terms;
use ahash::AHashMap;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use std::time::Instant;

type Postings = AHashMap<String, RoaringBitmap>;

/// Build the inverted search index and categorical indexes for `records`.
///
/// Linear in the total number of indexed terms. Large datasets are split
/// across rayon workers and the partial postings merged.
pub fn build_indexes(records: &[Record], config: &EngineConfig) -> Indexes {
    let start = Instant::now();
    let min_len = config.min_token_len.max(1);

    let postings = if records.len() >= config.parallel_threshold {
        records
            .par_iter()
            .enumerate()
            .fold(Postings::new, |mut acc, (pos, record)| {
                register_record(&mut acc, pos as Position, record, min_len);
                acc
            })
            .reduce(Postings::new, merge_postings)
    } else {
        let mut acc = Postings::new();
        for (pos, record) in records.iter().enumerate() {
            register_record(&mut acc, pos as Position, record, min_len);
        }
        acc
    };

    let mut entries: Vec<(String, RoaringBitmap)> = postings.into_iter().collect();
    entries.par_sort_unstable_by(|a, b| a.0.cmp(&b.0));
    let search = SearchIndex::from_sorted(entries);

    let mut categorical = CategoricalIndex::default();
    for (pos, record) in records.iter().enumerate() {
        for field in CategoricalField::ALL {
            if let Some(value) = record.categorical(field) {
                categorical.insert(field, value, pos as Position);
            }
        }
    }

    tracing::debug!(
        target: "modelcat::index",
        records = records.len(),
        tokens = search.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Indexes built"
    );

    Indexes {
        search,
        categorical,
        record_count: records.len(),
    }
}

fn register_record(postings: &mut Postings, pos: Position, record: &Record, min_len: usize) {
    for field in TextField::ALL {
        let Some(text) = record.text(field) else {
            continue;
        };
        for term in index_terms(text, min_len) {
            postings.entry(term).or_default().insert(pos);
        }
    }
}

fn merge_postings(mut left: Postings, right: Postings) -> Postings {
    if left.len() < right.len() {
        return merge_postings(right, left);
    }
    for (term, positions) in right {
        *left.entry(term).or_default() |= positions;
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::synthetic_records;

    fn sample() -> Vec<Record> {
        vec![
            Record {
                model_name: "Llama Chat Q4".to_string(),
                quant_format: Some("Q4_K_M".to_string()),
                license: Some("llama2".to_string()),
                ..Default::default()
            },
            Record {
                model_name: "Mistral Base Q8".to_string(),
                quant_format: Some("Q8_0".to_string()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_build_empty() {
        let indexes = build_indexes(&[], &EngineConfig::default());
        assert!(indexes.search.is_empty());
        assert_eq!(indexes.record_count, 0);
        assert_eq!(indexes.categorical.value_count(CategoricalField::QuantFormat), 0);
    }

    #[test]
    fn test_build_registers_prefixes_and_categories() {
        let indexes = build_indexes(&sample(), &EngineConfig::default());

        let ll = indexes.search.get("ll").unwrap();
        assert!(ll.contains(0) && !ll.contains(1));
        assert!(indexes.search.get("q8_0").unwrap().contains(1));
        assert!(indexes.search.get("q4").unwrap().contains(0));

        let q8 = indexes
            .categorical
            .lookup(CategoricalField::QuantFormat, "q8_0")
            .unwrap();
        assert_eq!(q8.iter().collect::<Vec<_>>(), vec![1]);
        assert!(indexes.categorical.lookup(CategoricalField::License, "llama2").is_some());
        assert!(indexes.categorical.lookup(CategoricalField::License, "mit").is_none());
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let records = synthetic_records(3_000, 11);
        let sequential = build_indexes(&records, &EngineConfig::default());
        let parallel = build_indexes(
            &records,
            &EngineConfig {
                parallel_threshold: 1,
                ..Default::default()
            },
        );

        assert_eq!(sequential.search.len(), parallel.search.len());
        for token in sequential.search.tokens().take(500) {
            assert_eq!(sequential.search.get(token), parallel.search.get(token));
        }
    }
}
