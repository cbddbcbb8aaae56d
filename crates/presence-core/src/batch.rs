//! Helpers for shaping request payloads.

use serde::{Deserialize, Serialize};

/// A single value or a sequence of values.
///
/// Accepts `"id"` as well as `["a", "b"]` when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Whether there is nothing in it.
    ///
    /// A single value is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(items) => items.is_empty(),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for OneOrMany<String> {
    fn from(values: &[&str]) -> Self {
        Self::Many(values.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Turn a value or sequence into a sequence.
///
/// Sequences are returned as-is; single values are wrapped.
#[must_use]
pub fn ensure_array<T>(input: impl Into<OneOrMany<T>>) -> Vec<T> {
    match input.into() {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    }
}

/// Split `items` into consecutive chunks of at most `limit` elements.
///
/// Order is preserved and the last chunk may be shorter. An empty input
/// yields no chunks. A `limit` of zero is treated as one.
#[must_use]
pub fn batch_array<T: Clone>(items: &[T], limit: usize) -> Vec<Vec<T>> {
    items.chunks(limit.max(1)).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_array_wraps_single() {
        assert_eq!(ensure_array::<String>("x"), vec!["x".to_string()]);
        assert_eq!(ensure_array::<u32>(7), vec![7]);
    }

    #[test]
    fn test_ensure_array_keeps_sequence() {
        let ids = vec!["x".to_string(), "y".to_string()];
        assert_eq!(ensure_array::<String>(ids.clone()), ids);
        assert_eq!(ensure_array::<String>(vec!["x", "y"]), ids);
    }

    #[test]
    fn test_batch_array() {
        let items: Vec<u32> = (1..=120).collect();
        let batches = batch_array(&items, 50);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], (1..=50).collect::<Vec<_>>());
        assert_eq!(batches[1], (51..=100).collect::<Vec<_>>());
        assert_eq!(batches[2], (101..=120).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_array_empty() {
        let items: Vec<u32> = Vec::new();
        assert!(batch_array(&items, 50).is_empty());
    }

    #[test]
    fn test_batch_array_exact_multiple() {
        let items: Vec<u32> = (0..100).collect();
        let batches = batch_array(&items, 50);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 50));
    }

    #[test]
    fn test_one_or_many_from_json() {
        let one: OneOrMany<String> = serde_json::from_str("\"a\"").unwrap();
        let many: OneOrMany<String> = serde_json::from_str("[\"a\",\"b\"]").unwrap();

        assert_eq!(one, OneOrMany::One("a".to_string()));
        assert_eq!(ensure_array::<String>(many), vec!["a".to_string(), "b".to_string()]);
        assert!(OneOrMany::<String>::Many(vec![]).is_empty());
    }
}
