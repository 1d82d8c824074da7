//! Shared utility functions for time parsing and KPI arithmetic.

use crate::error::{FlowMetricsError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

const SECONDS_PER_HOUR: u64 = 3600;

/// Parses a backend timestamp.
///
/// Accepts RFC 3339 with an explicit offset, or a naive ISO-8601 date-time
/// (`T` or space separated, optional fractional seconds) taken as UTC.
/// Returns `None` for anything else.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Postgres renders `timestamptz` as `+00` without minutes
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parses a plain `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Resolves an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| FlowMetricsError::config(format!("Unknown timezone '{name}': {e}")))
}

/// Converts seconds to hours rounded to one decimal place.
#[allow(clippy::cast_precision_loss)]
pub fn seconds_to_hours(seconds: u64) -> f64 {
    round_one_decimal(seconds as f64 / SECONDS_PER_HOUR as f64)
}

/// Rounds to one decimal place, halves away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Formats accumulated study seconds as `"{h}h {m}m"`.
pub fn format_study_time(seconds: u64) -> String {
    let hours = seconds / SECONDS_PER_HOUR;
    let minutes = (seconds % SECONDS_PER_HOUR) / 60;
    format!("{hours}h {minutes}m")
}

/// Percentage change from `previous` to `current`; 0 when `previous` is 0.
#[allow(clippy::cast_precision_loss)]
pub fn growth_rate(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

/// `part / whole * 100` clamped to `[0, 100]`; 0 when `whole` is 0.
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    clamp_percentage(part as f64 / whole as f64 * 100.0)
}

/// Clamps a percentage into `[0, 100]`, mapping non-finite values to 0.
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Extracts the first run of ASCII digits in `input`, e.g. `"4 semanas"` → 4.
pub fn first_integer(input: &str) -> Option<u32> {
    let start = input.find(|c: char| c.is_ascii_digit())?;
    let digits: String = input[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Sum of the UTF-16 code units of `input`.
pub fn char_code_seed(input: &str) -> u64 {
    input.encode_utf16().map(u64::from).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T09:30:00-03:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00+00"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01T00:00:00Z"), None);
    }

    #[test]
    fn test_first_integer() {
        assert_eq!(first_integer("4 semanas"), Some(4));
        assert_eq!(first_integer("approx. 12 weeks"), Some(12));
        assert_eq!(first_integer("sem prazo"), None);
    }

    #[test]
    fn test_char_code_seed() {
        assert_eq!(char_code_seed("ab"), 97 + 98);
        assert_eq!(char_code_seed(""), 0);
    }
}
