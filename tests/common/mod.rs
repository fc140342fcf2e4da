//! Shared helpers for integration tests
#![allow(dead_code)]

use modelcat::query::{CatalogQuery, Direction};
use modelcat::record::{Position, Record, TextField};
use std::cmp::Ordering;

/// Straightforward reference pipeline: scan every record, then stable sort
pub fn naive_query(records: &[Record], query: &CatalogQuery) -> Vec<Position> {
    let prepared = query.prepare();

    let mut hits: Vec<Position> = (0..records.len() as Position)
        .filter(|&p| {
            let record = &records[p as usize];
            let texts: Vec<String> = TextField::ALL
                .iter()
                .filter_map(|&f| record.text(f))
                .map(str::to_lowercase)
                .collect();
            prepared
                .words
                .iter()
                .all(|w| texts.iter().any(|t| t.contains(w.as_str())))
                && prepared.filters.predicates.iter().all(|pred| pred.matches(record))
        })
        .collect();

    if let Some(spec) = query.sorting {
        // Vec::sort_by is stable, so ties keep position order
        hits.sort_by(|&a, &b| {
            let ka = spec.field.key(&records[a as usize]);
            let kb = spec.field.key(&records[b as usize]);
            match (ka, kb) {
                (Some(x), Some(y)) => match spec.direction {
                    Direction::Ascending => x.cmp(&y),
                    Direction::Descending => y.cmp(&x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }

    hits
}

pub fn named_with_likes(name: &str, likes: Option<u64>) -> Record {
    Record {
        like_count: likes,
        ..Record::named(name)
    }
}
