// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Date and time parsers backed by the `time` crate.

use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{ParseError, Parser};

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Unix epoch milliseconds, e.g. `1700000000000`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamp;

impl Parser for Timestamp {
    type Value = OffsetDateTime;

    fn parse(&self, raw: &str) -> Result<OffsetDateTime, ParseError> {
        let millis = raw
            .parse::<i64>()
            .map_err(|_| ParseError::invalid("timestamp", raw))?;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map_err(|_| ParseError::invalid("timestamp", raw))
    }

    fn serialize(&self, value: &OffsetDateTime) -> String {
        (value.unix_timestamp_nanos() / 1_000_000).to_string()
    }

    fn values_equal(&self, a: &OffsetDateTime, b: &OffsetDateTime) -> bool {
        a.unix_timestamp_nanos() / 1_000_000 == b.unix_timestamp_nanos() / 1_000_000
    }
}

/// RFC 3339 date-time, always serialized in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateTime;

impl Parser for IsoDateTime {
    type Value = OffsetDateTime;

    fn parse(&self, raw: &str) -> Result<OffsetDateTime, ParseError> {
        OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| ParseError::invalid("date-time", raw))
    }

    fn serialize(&self, value: &OffsetDateTime) -> String {
        // Years outside 0..=9999 have no RFC 3339 form.
        value
            .to_offset(UtcOffset::UTC)
            .format(&Rfc3339)
            .unwrap_or_default()
    }
}

/// Calendar date `YYYY-MM-DD`. Longer ISO strings are accepted and truncated
/// to their date part.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDate;

impl Parser for IsoDate {
    type Value = Date;

    fn parse(&self, raw: &str) -> Result<Date, ParseError> {
        let head = raw.get(..10).unwrap_or(raw);
        Date::parse(head, DATE_FORMAT).map_err(|_| ParseError::invalid("date", raw))
    }

    fn serialize(&self, value: &Date) -> String {
        value.format(DATE_FORMAT).unwrap_or_default()
    }
}
