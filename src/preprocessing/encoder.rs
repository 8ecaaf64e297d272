//! Category-to-index encoding

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Reserved index for the most frequent category; unseen values fall back here
pub const FALLBACK_INDEX: usize = 0;

/// Ordered bijection between known categories and integer indices.
///
/// Categories are ordered by training frequency (descending), ties broken
/// lexicographically, so index 0 is always the most frequent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    categories: Vec<String>,
    index: BTreeMap<String, usize>,
}

/// Result of encoding a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    Known(usize),
    /// Value was not in the training vocabulary and took the fallback index
    Unseen,
}

impl Encoded {
    pub fn index(self) -> usize {
        match self {
            Encoded::Known(i) => i,
            Encoded::Unseen => FALLBACK_INDEX,
        }
    }
}

impl CategoryEncoder {
    /// Learn the vocabulary from training values (missing values are ignored)
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let categories: Vec<String> = ranked.into_iter().map(|(c, _)| c.to_string()).collect();
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        Self { categories, index }
    }

    /// Most frequent training category, used to impute missing values
    pub fn mode(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Encode a value. Missing values are imputed with the mode.
    pub fn encode(&self, value: Option<&str>) -> Encoded {
        match value {
            None => Encoded::Known(FALLBACK_INDEX),
            Some(v) => self
                .index
                .get(v)
                .copied()
                .map_or(Encoded::Unseen, Encoded::Known),
        }
    }

    /// Category for an index, if in range
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.categories.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_frequent_gets_index_zero() {
        let values = ["pos", "web", "web", "atm", "web", "pos"];
        let encoder = CategoryEncoder::fit(values.iter().map(|v| Some(*v)));

        assert_eq!(encoder.categories(), &["web", "pos", "atm"]);
        assert_eq!(encoder.mode(), Some("web"));
        assert_eq!(encoder.encode(Some("atm")), Encoded::Known(2));
    }

    #[test]
    fn test_frequency_ties_are_lexicographic() {
        let encoder = CategoryEncoder::fit(vec![Some("b"), Some("a"), Some("c"), Some("a"), Some("b")]);
        assert_eq!(encoder.categories(), &["a", "b", "c"]);
    }

    #[test]
    fn test_unseen_and_missing_values_use_fallback() {
        let encoder = CategoryEncoder::fit(vec![Some("x"), Some("y"), Some("y"), None]);

        let unseen = encoder.encode(Some("never-seen"));
        assert_eq!(unseen, Encoded::Unseen);
        assert_eq!(unseen.index(), FALLBACK_INDEX);
        assert_eq!(encoder.decode(unseen.index()), Some("y"));
        assert_eq!(encoder.encode(None).index(), FALLBACK_INDEX);
    }
}
