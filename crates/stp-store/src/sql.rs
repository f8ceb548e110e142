//! Column encodings shared by the SQLite gateways.
//!
//! Timestamps are fixed-width RFC 3339 (microseconds, `Z`) so that string
//! comparison in SQL orders them correctly. Dates are `YYYY-MM-DD`, decimals
//! their canonical string form.

use std::error::Error;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rusqlite::types::Type;

pub(crate) fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn conversion_err(
    idx: usize,
    e: impl Into<Box<dyn Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

pub(crate) fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_opt_date(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| parse_date(idx, &s)).transpose()
}

pub(crate) fn parse_decimal(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_opt_decimal(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<Decimal>> {
    raw.map(|s| parse_decimal(idx, &s)).transpose()
}

/// Parse a TEXT column into one of the model enums.
pub(crate) fn parse_enum<T: FromStr<Err = String>>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(ts(&early) < ts(&late));
        assert_eq!(ts(&early).len(), ts(&late).len());
    }

    #[test]
    fn timestamp_roundtrip() {
        let now = Utc::now();
        let parsed = parse_ts(0, &ts(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn bad_decimal_is_conversion_failure() {
        let err = parse_decimal(3, "1,000").unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(3, _, _)));
    }
}
