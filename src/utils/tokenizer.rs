use ahash::AHashSet;

/// Characters that split a field value into tokens
fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == '-' || ch == '_'
}

/// Split text on whitespace, hyphens and underscores, lower-cased, dropping
/// tokens shorter than `min_len` characters.
pub fn tokenize(text: &str, min_len: usize) -> impl Iterator<Item = String> + '_ {
    text.split(is_separator)
        .filter(move |t| t.chars().count() >= min_len)
        .map(|t| t.to_lowercase())
}

/// Terms registered in the search index for one field value.
///
/// Each whitespace-delimited word is registered whole (so `q4_k_m` stays
/// findable as typed), then every token of it and every prefix of each token
/// of at least `min_len` characters.
pub fn index_terms(text: &str, min_len: usize) -> AHashSet<String> {
    let mut terms = AHashSet::new();

    for word in text.split_whitespace() {
        let word = word.to_lowercase();
        if word.chars().count() < min_len {
            continue;
        }

        for token in tokenize(&word, min_len) {
            add_prefixes(&mut terms, &token, min_len);
        }
        terms.insert(word);
    }

    terms
}

fn add_prefixes(terms: &mut AHashSet<String>, token: &str, min_len: usize) {
    for (count, (idx, ch)) in token.char_indices().enumerate() {
        if count + 1 >= min_len {
            terms.insert(token[..idx + ch.len_utf8()].to_string());
        }
    }
}

/// Normalize a search query into distinct lower-cased words, in order
pub fn query_words(query: &str) -> Vec<String> {
    let mut seen = AHashSet::new();
    let lowered = query.trim().to_lowercase();
    lowered
        .split_whitespace()
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}
