// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Query-string parameters with unique keys.

use std::fmt;

use url::form_urlencoded;

/// Decoded `application/x-www-form-urlencoded` query parameters.
///
/// Keys are unique. Parsing keeps the last occurrence of a repeated key (at
/// the position of its first occurrence). Equality ignores ordering since each
/// key is read independently.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string, with or without its leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::new();
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            params.set(k.into_owned(), v.into_owned());
        }
        params
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite `key`. Existing keys keep their position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.pairs.push((key, value));
        }
    }

    /// Remove `key`; returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|(k, _)| k != key);
        self.pairs.len() != before
    }

    /// Partial merge: `Some` sets, `None` deletes, absent keys are untouched.
    pub fn apply<'a, I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        for (key, value) in updates {
            match value {
                Some(v) => self.set(key, v),
                None => {
                    self.delete(key);
                }
            }
        }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no keys.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Percent-encoded query string without the leading `?`.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

impl PartialEq for SearchParams {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for SearchParams {}

impl fmt::Display for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K, V> FromIterator<(K, V)> for SearchParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_decodes_and_last_occurrence_wins() {
        let p = SearchParams::parse("?q=a%20b&page=1&q=c+d");
        assert_eq!(p.len(), 2);
        assert_eq!(p.get("q"), Some("c d"));
        assert_eq!(p.get("page"), Some("1"));
        assert_eq!(p.iter().next(), Some(("q", "c d")));
    }

    #[test]
    fn apply_is_a_partial_merge() {
        let mut p = SearchParams::parse("b=1&c=2");
        p.apply([("a", Some("x")), ("c", None), ("missing", None)]);
        assert_eq!(p, SearchParams::parse("a=x&b=1"));
        assert!(!p.contains("c"));
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(SearchParams::parse("a=1&b=2"), SearchParams::parse("b=2&a=1"));
        assert_ne!(SearchParams::parse("a=1"), SearchParams::parse("a=1&b=2"));
    }

    #[test]
    fn query_string_percent_encodes() {
        let p: SearchParams = [("name", "Ada & co"), ("tag", "ü")].into_iter().collect();
        assert_eq!(p.to_query_string(), "name=Ada+%26+co&tag=%C3%BC");
        assert_eq!(SearchParams::parse(&p.to_string()), p);
    }
}
