use std::collections::BTreeSet;

/// Default Jaccard score a reference title must reach to be considered the same media.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Words that carry no identity when comparing release titles.
const TITLE_STOPWORDS: [&str; 4] = ["the", "a", "and", "as"];

/// A whole token of four digits in 1900-2099.
fn is_release_year(token: &str) -> bool {
    token.len() == 4
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token.starts_with("19") || token.starts_with("20"))
}

/// Token-set comparison key for a release title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleKey {
    tokens: BTreeSet<String>,
}

impl TitleKey {
    /// Build a comparison key from a raw title.
    ///
    /// Normalization steps:
    /// - lowercase
    /// - split on anything that is not a word character
    /// - drop release years (1900-2099) so "Dune (2021)" and "Dune" agree
    /// - drop articles and conjunctions
    pub fn new(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        let tokens = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty() && !is_release_year(t) && !TITLE_STOPWORDS.contains(t))
            .map(str::to_owned)
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Jaccard similarity between the two token sets.
    pub fn similarity(&self, other: &Self) -> f64 {
        jaccard(&self.tokens, &other.tokens)
    }
}

/// |A ∩ B| / |A ∪ B|. Two empty sets are identical; one empty set matches nothing.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}
