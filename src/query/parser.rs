use crate::query::CatalogQuery;
use crate::query::filter::{Filter, GpuRequirement};
use crate::query::sort::{Direction, SortField, SortSpec};
use crate::record::{CategoricalField, NumericField};

/// Query string broken down into an engine query plus display options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub query: CatalogQuery,
    /// Maximum results to show (`top:N`)
    pub limit: Option<usize>,
}

/// Parse a query string such as
/// `llama chat format:q4_k_m downloads:>=100 gpu:no sort:-likes`.
///
/// Free words form the search text. Recognized `field:value` tokens become
/// filters; unknown fields and unparsable values are kept as search words.
pub fn parse_query(input: &str) -> ParsedQuery {
    let mut parser = QueryParser::new(input);
    parser.parse()
}

/// `[EMPTY_BOUND, EMPTY_BOUND]` holds no integer, so it matches no record
const EMPTY_BOUND: f64 = 0.5;

struct QueryParser<'a> {
    input: &'a str,
    pos: usize,
    words: Vec<String>,
    parsed: ParsedQuery,
}

impl<'a> QueryParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            words: Vec::new(),
            parsed: ParsedQuery::default(),
        }
    }

    fn parse(&mut self) -> ParsedQuery {
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                break;
            }
            self.parse_term();
        }

        let mut parsed = std::mem::take(&mut self.parsed);
        parsed.query.search_query = self.words.join(" ");
        parsed
    }

    fn parse_term(&mut self) {
        let input = self.input;
        let start = self.pos;

        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                break;
            }
            self.advance();
            if ch == ':' {
                let field = &input[start..self.pos - 1];
                let value = self.read_value();
                if !field.is_empty() && self.apply_field(field, value) {
                    return;
                }
                break;
            }
        }

        // Not a recognized filter, keep the whole token as search text
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                break;
            }
            self.advance();
        }
        let word = &input[start..self.pos];
        if !word.is_empty() {
            self.words.push(word.to_string());
        }
    }

    fn read_value(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                break;
            }
            self.advance();
        }
        &input[start..self.pos]
    }

    /// Returns false when the token should be treated as a search word
    fn apply_field(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        let filters = &mut self.parsed.query.filters;

        match field.to_lowercase().as_str() {
            "format" | "quant" => {
                filters.push(Filter::categorical(CategoricalField::QuantFormat, value))
            }
            "type" => filters.push(Filter::categorical(CategoricalField::ModelType, value)),
            "license" => filters.push(Filter::categorical(CategoricalField::License, value)),
            "size" => return self.apply_range(NumericField::FileSize, value, parse_size),
            "downloads" => return self.apply_range(NumericField::DownloadCount, value, parse_count),
            "likes" => return self.apply_range(NumericField::LikeCount, value, parse_count),
            "cores" | "cpu" => match parse_count(value) {
                Some(n) => filters.push(Filter::min_cpu_cores(n)),
                None => return false,
            },
            "ram" => match parse_size_gb(value) {
                Some(n) => filters.push(Filter::min_ram_gb(n)),
                None => return false,
            },
            "gpu" => match value.to_lowercase().as_str() {
                "yes" | "true" | "required" => filters.push(Filter::gpu(GpuRequirement::Required)),
                "no" | "false" | "none" => filters.push(Filter::gpu(GpuRequirement::NotRequired)),
                "any" | "all" => {}
                _ => return false,
            },
            "sort" => {
                let (direction, name) = match value.strip_prefix('-') {
                    Some(rest) => (Direction::Descending, rest),
                    None => (Direction::Ascending, value.strip_prefix('+').unwrap_or(value)),
                };
                match name.parse::<SortField>() {
                    Ok(field) => self.parsed.query.sorting = Some(SortSpec { field, direction }),
                    Err(_) => return false,
                }
            }
            "top" => match value.parse() {
                Ok(n) => self.parsed.limit = Some(n),
                Err(_) => return false,
            },
            _ => return false,
        }
        true
    }

    /// `>=n`, `>n`, `<=n`, `<n`, `a..b`, `a..`, `..b` or a bare `n`
    /// (exact value)
    fn apply_range(
        &mut self,
        field: NumericField,
        value: &str,
        number: fn(&str) -> Option<f64>,
    ) -> bool {
        let (min, max) = if let Some(rest) = value.strip_prefix(">=") {
            (number(rest), None)
        } else if let Some(rest) = value.strip_prefix('>') {
            // Smallest integer strictly above n
            (number(rest).map(|n| (n.floor() + 1.0).max(0.0)), None)
        } else if let Some(rest) = value.strip_prefix("<=") {
            (None, number(rest))
        } else if let Some(rest) = value.strip_prefix('<') {
            match number(rest) {
                // No count lies below zero
                Some(n) if n <= 0.0 => (Some(EMPTY_BOUND), Some(EMPTY_BOUND)),
                // Largest integer strictly below n
                Some(n) => (None, Some(n.ceil() - 1.0)),
                None => (None, None),
            }
        } else if let Some((lo, hi)) = value.split_once("..") {
            let lo = if lo.is_empty() { None } else { number(lo) };
            let hi = if hi.is_empty() { None } else { number(hi) };
            if lo.is_none() && hi.is_none() {
                return false;
            }
            (lo, hi)
        } else {
            let exact = number(value);
            (exact, exact)
        };

        if min.is_none() && max.is_none() {
            return false;
        }
        self.parsed.query.filters.push(Filter::range(field, min, max));
        true
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }
}

fn parse_count(s: &str) -> Option<f64> {
    let n: f64 = s.parse().ok()?;
    n.is_finite().then_some(n)
}

/// Byte count with an optional `kb`/`mb`/`gb` suffix (binary units)
fn parse_size(s: &str) -> Option<f64> {
    let lower = s.to_lowercase();
    let (digits, multiplier) = if let Some(n) = lower.strip_suffix("gb") {
        (n, 1024.0 * 1024.0 * 1024.0)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, 1024.0 * 1024.0)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n, 1024.0)
    } else {
        (lower.strip_suffix('b').unwrap_or(&lower), 1.0)
    };
    parse_count(digits).map(|n| n * multiplier)
}

/// Gigabyte count, `16` or `16gb`
fn parse_size_gb(s: &str) -> Option<f64> {
    let lower = s.to_lowercase();
    parse_count(lower.strip_suffix("gb").unwrap_or(&lower))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::{FilterSpec, Predicate};
    use crate::record::Record;

    fn predicates(input: &str) -> Vec<Predicate> {
        parse_query(input).query.filters.normalize().predicates
    }

    #[test]
    fn test_plain_words() {
        let parsed = parse_query("  llama   chat ");
        assert_eq!(parsed.query.search_query, "llama chat");
        assert!(parsed.query.filters.is_empty());
        assert_eq!(parsed.limit, None);
    }

    #[test]
    fn test_categorical_filters() {
        let parsed = parse_query("format:Q4_K_M type:llama license:mit");
        assert_eq!(parsed.query.search_query, "");
        assert_eq!(
            parsed.query.filters,
            FilterSpec::new()
                .with(Filter::categorical(CategoricalField::QuantFormat, "Q4_K_M"))
                .with(Filter::categorical(CategoricalField::ModelType, "llama"))
                .with(Filter::categorical(CategoricalField::License, "mit"))
        );
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(
            predicates("downloads:>=100"),
            vec![Predicate::Range {
                field: NumericField::DownloadCount,
                min: 100,
                max: None
            }]
        );
        assert_eq!(
            predicates("likes:10..500"),
            vec![Predicate::Range {
                field: NumericField::LikeCount,
                min: 10,
                max: Some(500)
            }]
        );
        assert_eq!(
            predicates("size:<4gb"),
            vec![Predicate::Range {
                field: NumericField::FileSize,
                min: 0,
                max: Some(4 * 1024 * 1024 * 1024 - 1)
            }]
        );
        assert_eq!(
            predicates("likes:>9"),
            vec![Predicate::Range {
                field: NumericField::LikeCount,
                min: 10,
                max: None
            }]
        );
    }

    #[test]
    fn test_strict_bounds_with_fractions() {
        assert_eq!(
            predicates("likes:>9.5"),
            vec![Predicate::Range {
                field: NumericField::LikeCount,
                min: 10,
                max: None
            }]
        );
        assert_eq!(
            predicates("likes:<4.5"),
            vec![Predicate::Range {
                field: NumericField::LikeCount,
                min: 0,
                max: Some(4)
            }]
        );
        assert_eq!(
            predicates("downloads:>-3"),
            Vec::<Predicate>::new()
        );
    }

    #[test]
    fn test_below_zero_matches_nothing() {
        let preds = predicates("likes:<0");
        assert_eq!(preds.len(), 1);
        assert!(parse_query("likes:<0").query.filters.normalize().warnings.is_empty());

        for likes in [0, 1, 100] {
            let record = Record {
                like_count: Some(likes),
                ..Record::named("any")
            };
            assert!(!preds[0].matches(&record), "likes {likes} matched");
        }
    }

    #[test]
    fn test_hardware_filters() {
        assert_eq!(
            predicates("cores:8 ram:16gb gpu:no"),
            vec![
                Predicate::MinCpuCores(8),
                Predicate::MinRamGb(16),
                Predicate::Gpu(false)
            ]
        );
        assert!(predicates("gpu:any").is_empty());
    }

    #[test]
    fn test_sort_and_top() {
        let parsed = parse_query("mistral sort:-downloads top:5");
        assert_eq!(parsed.query.search_query, "mistral");
        assert_eq!(parsed.query.sorting, Some(SortSpec::desc(SortField::DownloadCount)));
        assert_eq!(parsed.limit, Some(5));

        let parsed = parse_query("sort:name");
        assert_eq!(parsed.query.sorting, Some(SortSpec::asc(SortField::ModelName)));
    }

    #[test]
    fn test_unknown_fields_stay_in_search() {
        let parsed = parse_query("author:thebloke downloads:lots sort:colour gpu:maybe x:");
        assert_eq!(
            parsed.query.search_query,
            "author:thebloke downloads:lots sort:colour gpu:maybe x:"
        );
        assert!(parsed.query.filters.is_empty());
        assert!(parsed.query.sorting.is_none());
    }

    #[test]
    fn test_full_example() {
        let parsed = parse_query(
            "llama chat format:q4_k_m type:llama license:mit downloads:>=100 \
             likes:10..500 size:<4gb cores:8 ram:16 gpu:no sort:-downloads",
        );
        assert_eq!(parsed.query.search_query, "llama chat");
        assert_eq!(parsed.query.filters.filters.len(), 9);
        assert_eq!(parsed.query.sorting, Some(SortSpec::desc(SortField::DownloadCount)));
    }

    #[test]
    fn test_unicode_input() {
        let parsed = parse_query("über größe:1 ");
        assert_eq!(parsed.query.search_query, "über größe:1");
    }
}
