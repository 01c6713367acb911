// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar parsers: string, integer, float, boolean.

use crate::{ParseError, Parser};

/// Identity parser; every raw value is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringParser;

impl Parser for StringParser {
    type Value = String;

    fn parse(&self, raw: &str) -> Result<String, ParseError> {
        Ok(raw.to_owned())
    }

    fn serialize(&self, value: &String) -> String {
        value.clone()
    }
}

/// Base-10 `i64` parser. Surrounding whitespace and trailing garbage are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerParser;

impl Parser for IntegerParser {
    type Value = i64;

    fn parse(&self, raw: &str) -> Result<i64, ParseError> {
        raw.parse::<i64>()
            .map_err(|_| ParseError::invalid("integer", raw))
    }

    fn serialize(&self, value: &i64) -> String {
        value.to_string()
    }
}

/// `f64` parser restricted to finite values.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatParser;

impl Parser for FloatParser {
    type Value = f64;

    fn parse(&self, raw: &str) -> Result<f64, ParseError> {
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ParseError::invalid("float", raw)),
        }
    }

    fn serialize(&self, value: &f64) -> String {
        // `Display` for f64 is the shortest string that round-trips.
        value.to_string()
    }

    #[allow(clippy::float_cmp)]
    fn values_equal(&self, a: &f64, b: &f64) -> bool {
        a == b
    }
}

/// `true` / `false` parser (case-insensitive on input, lowercase on output).
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanParser;

impl Parser for BooleanParser {
    type Value = bool;

    fn parse(&self, raw: &str) -> Result<bool, ParseError> {
        if raw.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ParseError::invalid("boolean", raw))
        }
    }

    fn serialize(&self, value: &bool) -> String {
        value.to_string()
    }
}
