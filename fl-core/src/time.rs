//! Millisecond-precision instants and ISO-8601 conversion.
//!
//! Records are persisted as unix milliseconds and exported as
//! `YYYY-MM-DDTHH:MM:SS.sssZ`, so every instant that enters the store is
//! truncated to milliseconds first.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{FlError, FlResult};

/// Current time truncated to millisecond precision.
pub fn now() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drop sub-millisecond precision from an instant.
pub fn truncate_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

/// Format an instant as ISO-8601 with millisecond precision and a `Z` suffix.
pub fn to_iso(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 / ISO-8601 timestamp into a UTC instant.
pub fn parse_iso(value: &str) -> FlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| truncate_millis(dt.with_timezone(&Utc)))
        .map_err(|e| FlError::Validation(format!("invalid timestamp '{value}': {e}")))
}
