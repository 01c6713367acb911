// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed value codecs for URL query parameters.
//!
//! A [`Parser`] turns the raw string stored under one query key into a typed
//! value and back. Parsers are stateless and cheap to clone; consumers hold
//! one per key.
//!
//! # Contract
//!
//! - `parse(serialize(v))` yields a value for which `values_equal` holds.
//! - `parse` never panics on hostile input; a hand-edited URL surfaces as a
//!   [`ParseError`], which callers degrade to "absent" via [`safe_parse`].
//! - `serialize` is infallible. Removal of a key is expressed by the caller
//!   (`None`), never by a sentinel string.

use thiserror::Error;

pub mod collection;
pub mod date;
pub mod json;
pub mod primitive;

pub use collection::{ArrayOf, StringEnum};
pub use date::{IsoDate, IsoDateTime, Timestamp};
pub use json::Json;
pub use primitive::{BooleanParser, FloatParser, IntegerParser, StringParser};

/// Error raised when a raw query value cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The raw string is not a valid representation of the expected kind.
    #[error("invalid {kind}: {raw:?}")]
    Invalid {
        /// Human-readable name of the expected kind (e.g. `"integer"`).
        kind: &'static str,
        /// Offending raw value.
        raw: String,
    },
    /// The raw string is well-formed but outside the accepted set.
    #[error("{raw:?} is not an accepted value")]
    NotAllowed {
        /// Offending raw value.
        raw: String,
    },
    /// JSON payload failed to decode.
    #[error("json error: {0}")]
    Json(String),
}

impl ParseError {
    pub(crate) fn invalid(kind: &'static str, raw: &str) -> Self {
        Self::Invalid {
            kind,
            raw: raw.to_owned(),
        }
    }
}

/// Bidirectional codec between a raw query string value and a typed value.
pub trait Parser: Send + Sync + 'static {
    /// Decoded value type.
    type Value: Clone + PartialEq + Send + Sync + 'static;

    /// Decode a raw (already percent-decoded) query value.
    fn parse(&self, raw: &str) -> Result<Self::Value, ParseError>;

    /// Encode a value into its raw query representation.
    fn serialize(&self, value: &Self::Value) -> String;

    /// Behavioral equality used for default detection and change suppression.
    fn values_equal(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a == b
    }
}

/// Parse `raw` for `key`, logging and degrading to `None` on failure.
pub fn safe_parse<P: Parser + ?Sized>(parser: &P, key: &str, raw: &str) -> Option<P::Value> {
    match parser.parse(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, raw, %err, "discarding unparsable query value");
            None
        }
    }
}

/// Plain string parser.
pub fn string() -> StringParser {
    StringParser
}

/// Signed 64-bit integer parser.
pub fn integer() -> IntegerParser {
    IntegerParser
}

/// Finite `f64` parser.
pub fn float() -> FloatParser {
    FloatParser
}

/// `true` / `false` parser.
pub fn boolean() -> BooleanParser {
    BooleanParser
}

/// Unix-millisecond timestamp parser.
pub fn timestamp() -> Timestamp {
    Timestamp
}

/// RFC 3339 date-time parser.
pub fn iso_date_time() -> IsoDateTime {
    IsoDateTime
}

/// `YYYY-MM-DD` calendar date parser.
pub fn iso_date() -> IsoDate {
    IsoDate
}

/// Parser accepting only the listed literals.
pub fn string_enum<I, S>(allowed: I) -> StringEnum
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    StringEnum::new(allowed)
}

/// Separator-delimited list of `item` values (`,` by default).
pub fn array_of<P: Parser>(item: P) -> ArrayOf<P> {
    ArrayOf::new(item)
}

/// serde_json-encoded value parser.
pub fn json<T>() -> Json<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    Json::new()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn safe_parse_degrades_to_none() {
        assert_eq!(safe_parse(&integer(), "page", "twelve"), None);
        assert_eq!(safe_parse(&integer(), "page", "12"), Some(12));
    }

    #[test]
    fn parse_error_messages_name_the_kind() {
        let err = integer().parse("x1").unwrap_err();
        assert_eq!(err.to_string(), "invalid integer: \"x1\"");
    }
}
