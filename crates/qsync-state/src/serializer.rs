// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Build query strings from typed values without touching the URL.
//!
//! Useful for links: the output is what the URL *would* be after the given
//! writes, merged over an optional base.

use qsync_codec::Parser;
use qsync_core::SearchParams;

/// Accumulates typed writes over a base parameter set.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    params: SearchParams,
}

impl Serializer {
    /// Start from an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing parameters; keys not written are kept.
    pub fn with_base(base: SearchParams) -> Self {
        Self { params: base }
    }

    /// Write `value` under `key`; `None` removes the key.
    pub fn set<P: Parser>(mut self, key: &str, parser: &P, value: Option<&P::Value>) -> Self {
        match value {
            Some(v) => self.params.set(key, parser.serialize(v)),
            None => {
                self.params.delete(key);
            }
        }
        self
    }

    /// Like [`set`](Self::set), but removes the key when `value` equals `default`.
    pub fn set_or_clear<P: Parser>(
        self,
        key: &str,
        parser: &P,
        value: &P::Value,
        default: &P::Value,
    ) -> Self {
        if parser.values_equal(value, default) {
            self.set(key, parser, None)
        } else {
            self.set(key, parser, Some(value))
        }
    }

    /// Resulting parameters.
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Query string with a leading `?`, or empty when no parameters remain.
    pub fn to_query(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!("?{}", self.params.to_query_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qsync_codec::{array_of, boolean, integer, string};

    #[test]
    fn serializes_typed_values_over_base() {
        let base = SearchParams::parse("utm=mail&page=4");
        let tags = vec!["a".to_owned(), "b".to_owned()];
        let query = Serializer::with_base(base)
            .set("q", &string(), Some(&"hello world".to_owned()))
            .set("tags", &array_of(string()), Some(&tags))
            .set("dark", &boolean(), Some(&true))
            .set_or_clear("page", &integer(), &1, &1)
            .to_query();
        assert_eq!(query, "?utm=mail&q=hello+world&tags=a%2Cb&dark=true");
    }

    #[test]
    fn empty_result_has_no_question_mark() {
        let s = Serializer::with_base(SearchParams::parse("a=1")).set("a", &integer(), None);
        assert_eq!(s.to_query(), "");
        assert!(s.params().is_empty());
    }
}
