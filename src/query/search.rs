use crate::config::EngineConfig;
use crate::index::SearchIndex;
use crate::query::scan::{ScanMode, scan};
use crate::record::{Record, TextField};
use memchr::memmem::Finder;
use roaring::RoaringBitmap;

/// Resolves free-text query words to matching positions.
///
/// A word matches a record when some indexed text field contains it, case
/// insensitively. Every word must match (AND); within one word, any index
/// entry containing it counts (OR).
pub struct SearchResolver<'a> {
    records: &'a [Record],
    index: Option<&'a SearchIndex>,
    config: &'a EngineConfig,
    mode: ScanMode,
}

impl<'a> SearchResolver<'a> {
    pub fn new(
        records: &'a [Record],
        index: Option<&'a SearchIndex>,
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

    /// Positions matching every word, or `None` when there are no words and
    /// the search imposes no constraint
    pub fn resolve(&self, words: &[String]) -> Option<RoaringBitmap> {
        if words.is_empty() {
            return None;
        }

        let result = match self.index {
            Some(index) if self.records.len() > self.config.index_threshold => {
                self.resolve_indexed(index, words)
            }
            _ => self.resolve_linear(words),
        };

        tracing::debug!(
            target: "modelcat::search",
            words = words.len(),
            indexed = self.index.is_some() && self.records.len() > self.config.index_threshold,
            matches = result.len(),
            "Search resolved"
        );

        Some(result)
    }

    fn resolve_indexed(&self, index: &SearchIndex, words: &[String]) -> RoaringBitmap {
        let parallel = self.mode == ScanMode::Parallel;
        let mut acc: Option<RoaringBitmap> = None;

        for word in words {
            let hits = index.matching(word, parallel);
            let next = match acc {
                Some(mut prev) => {
                    prev &= hits;
                    prev
                }
                None => hits,
            };
            if next.is_empty() {
                return next;
            }
            acc = Some(next);
        }

        acc.unwrap_or_default()
    }

    fn resolve_linear(&self, words: &[String]) -> RoaringBitmap {
        let finders: Vec<Finder<'_>> = words.iter().map(|w| Finder::new(w.as_bytes())).collect();

        scan(self.records, None, self.mode, |record| {
            let fields: Vec<String> = TextField::ALL
                .iter()
                .filter_map(|&f| record.text(f))
                .map(str::to_lowercase)
                .collect();
            finders.iter().all(|finder| {
                fields
                    .iter()
                    .any(|text| finder.find(text.as_bytes()).is_some())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_indexes;
    use crate::record::synthetic_records;
    use crate::utils::query_words;

    fn sample() -> Vec<Record> {
        vec![Record::named("Llama Chat Q4"), Record::named("Mistral Base Q8")]
    }

    #[test]
    fn test_empty_query_is_unconstrained() {
        let records = sample();
        let config = EngineConfig::default();
        let resolver = SearchResolver::new(&records, None, &config, ScanMode::Blocking);
        assert!(resolver.resolve(&query_words("   ")).is_none());
    }

    #[test]
    fn test_linear_search() {
        let records = sample();
        let config = EngineConfig::default();
        let resolver = SearchResolver::new(&records, None, &config, ScanMode::Blocking);

        let hits = resolver.resolve(&query_words("CHAT")).unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![0]);

        let hits = resolver.resolve(&query_words("q chat")).unwrap();
        assert_eq!(hits.iter().collect::<Vec<_>>(), vec![0]);

        assert!(resolver.resolve(&query_words("chat q8")).unwrap().is_empty());
    }

    #[test]
    fn test_indexed_matches_linear() {
        let records = synthetic_records(4_000, 3);
        let config = EngineConfig::default();
        let indexes = build_indexes(&records, &config);

        let indexed =
            SearchResolver::new(&records, Some(&indexes.search), &config, ScanMode::Blocking);
        let linear = SearchResolver::new(&records, None, &config, ScanMode::Blocking);

        for query in ["llama", "chat 7b", "q4_k", "instruct mistral", "zzzz"] {
            let words = query_words(query);
            assert_eq!(
                indexed.resolve(&words),
                linear.resolve(&words),
                "query {query:?}"
            );
        }
    }

    #[test]
    fn test_adding_words_never_grows() {
        let records = synthetic_records(2_000, 5);
        let config = EngineConfig::default();
        let resolver = SearchResolver::new(&records, None, &config, ScanMode::Parallel);

        let one = resolver.resolve(&query_words("llama")).unwrap();
        let two = resolver.resolve(&query_words("llama chat")).unwrap();
        assert!(two.is_subset(&one));
    }
}
