//! Fetch cursor derived from the newest stored record.

use crate::{Error, Result};
use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;

/// Timestamp layout accepted after normalisation.
const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Timestamp layout the source expects for `start_time`.
const CURSOR_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Start bound for the next incremental fetch, encoded as ISO-8601 UTC.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// Derives the cursor that follows a stored `created_at` value.
    ///
    /// The source's range filter is inclusive, so the cursor is the stored
    /// timestamp plus one second. Normalisation is a fixed transformation:
    /// a trailing `Z` is dropped, then any fractional-seconds part, and the
    /// remainder must match `YYYY-MM-DDTHH:MM:SS`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the timestamp does not match.
    pub fn after(created_at: &str) -> Result<Self> {
        let next = parse_timestamp(created_at)? + TimeDelta::seconds(1);
        Ok(Self(next.format(CURSOR_FORMAT).to_string()))
    }

    /// Returns the encoded cursor.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses a source timestamp as naive UTC, whole seconds.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS` with an optional fractional part and an
/// optional trailing `Z`; the fraction is discarded.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the timestamp does not match.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(normalize(value), STORED_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("unparseable timestamp '{value}': {e}")))
}

fn normalize(created_at: &str) -> &str {
    let trimmed = created_at.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    trimmed
        .split_once('.')
        .map_or(trimmed, |(seconds, _fraction)| seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("2024-01-02T00:00:00", "2024-01-02T00:00:01Z" ; "plain")]
    #[test_case("2024-01-02T00:00:00.000Z", "2024-01-02T00:00:01Z" ; "millis and zulu")]
    #[test_case("2024-01-02T00:00:00Z", "2024-01-02T00:00:01Z" ; "zulu only")]
    #[test_case("2023-12-31T23:59:59.000Z", "2024-01-01T00:00:00Z" ; "year rollover")]
    #[test_case("2024-02-28T23:59:59.123Z", "2024-02-29T00:00:00Z" ; "leap day")]
    fn test_cursor_after(stored: &str, expected: &str) {
        assert_eq!(Cursor::after(stored).unwrap().as_str(), expected);
    }

    #[test]
    fn test_parse_timestamp_ignores_suffixes() {
        let plain = parse_timestamp("2024-01-02T00:00:01").unwrap();
        assert_eq!(parse_timestamp("2024-01-02T00:00:01Z").unwrap(), plain);
        assert_eq!(parse_timestamp("2024-01-02T00:00:01.999Z").unwrap(), plain);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(matches!(
            Cursor::after("yesterday"),
            Err(Error::InvalidInput(_))
        ));
        assert!(Cursor::after("2024-01-02").is_err());
    }
}
