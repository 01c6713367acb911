// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Literal sets and delimited lists.

use crate::{ParseError, Parser};

/// Accepts only values from a fixed set of literals.
#[derive(Debug, Clone)]
pub struct StringEnum {
    allowed: Vec<String>,
}

impl StringEnum {
    /// Build from the accepted literals.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepted literals in declaration order.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

impl Parser for StringEnum {
    type Value = String;

    fn parse(&self, raw: &str) -> Result<String, ParseError> {
        if self.allowed.iter().any(|a| a == raw) {
            Ok(raw.to_owned())
        } else {
            Err(ParseError::NotAllowed { raw: raw.to_owned() })
        }
    }

    fn serialize(&self, value: &String) -> String {
        value.clone()
    }
}

/// List of items joined by a separator.
///
/// Literal `%` and occurrences of the separator inside a serialized item are
/// percent-encoded so that any item survives the round trip. The separator
/// must not be `%`. Items that fail to
/// parse are dropped from the list rather than failing the whole value.
#[derive(Debug, Clone)]
pub struct ArrayOf<P> {
    item: P,
    separator: char,
    encoded_separator: String,
}

impl<P: Parser> ArrayOf<P> {
    /// Comma-separated list of `item` values.
    pub fn new(item: P) -> Self {
        Self::with_separator(item, ',')
    }

    /// List of `item` values joined by `separator`.
    pub fn with_separator(item: P, separator: char) -> Self {
        let mut buf = [0u8; 4];
        let encoded_separator = separator
            .encode_utf8(&mut buf)
            .bytes()
            .map(|b| format!("%{b:02X}"))
            .collect();
        Self {
            item,
            separator,
            encoded_separator,
        }
    }
}

impl<P: Parser> Parser for ArrayOf<P> {
    type Value = Vec<P::Value>;

    fn parse(&self, raw: &str) -> Result<Self::Value, ParseError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let items = raw
            .split(self.separator)
            .filter_map(|chunk| {
                let chunk = chunk
                    .replace(&self.encoded_separator, &self.separator.to_string())
                    .replace("%25", "%");
                match self.item.parse(&chunk) {
                    Ok(v) => Some(v),
                    Err(err) => {
                        tracing::debug!(%err, "dropping list item");
                        None
                    }
                }
            })
            .collect();
        Ok(items)
    }

    fn serialize(&self, value: &Self::Value) -> String {
        let sep = self.separator.to_string();
        value
            .iter()
            .map(|v| {
                self.item
                    .serialize(v)
                    .replace('%', "%25")
                    .replace(&sep, &self.encoded_separator)
            })
            .collect::<Vec<_>>()
            .join(&sep)
    }

    fn values_equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b.iter())
                .all(|(x, y)| self.item.values_equal(x, y))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{integer, string};

    #[test]
    fn string_enum_rejects_unknown_literals() {
        let p = StringEnum::new(["asc", "desc"]);
        assert_eq!(p.parse("desc").unwrap(), "desc");
        assert_eq!(
            p.parse("sideways"),
            Err(ParseError::NotAllowed {
                raw: "sideways".into()
            })
        );
    }

    #[test]
    fn array_escapes_separator_inside_items() {
        let p = ArrayOf::new(string());
        let v = vec!["a,b".to_owned(), "c".to_owned()];
        let raw = p.serialize(&v);
        assert_eq!(raw, "a%2Cb,c");
        assert_eq!(p.parse(&raw).unwrap(), v);
    }

    #[test]
    fn array_keeps_literal_percent_sequences() {
        let p = ArrayOf::new(string());
        let v = vec!["100%2C".to_owned(), "50%".to_owned(), "%,".to_owned()];
        let raw = p.serialize(&v);
        assert_eq!(raw, "100%252C,50%25,%25%2C");
        assert_eq!(p.parse(&raw).unwrap(), v);
    }

    #[test]
    fn array_drops_invalid_items_and_handles_empty() {
        let p = ArrayOf::with_separator(integer(), '|');
        assert_eq!(p.parse("1|x|3").unwrap(), vec![1, 3]);
        assert!(p.parse("").unwrap().is_empty());
        assert_eq!(p.serialize(&vec![4, 5]), "4|5");
    }
}
