//! Date helpers for `YYYY-MM-DD` strings.

use chrono::NaiveDate;
use thiserror::Error;

use crate::clock::Clock;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Date must be YYYY-MM-DD: {0}")]
    InvalidFormat(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a strict, zero-padded `YYYY-MM-DD` string.
pub fn parse_date(value: &str) -> Result<NaiveDate, DateError> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(DateError::InvalidFormat(value.to_string()));
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| DateError::InvalidDate(value.to_string()))
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Today as `YYYY-MM-DD`.
pub fn today(clock: &dyn Clock) -> String {
    format_date(clock.today())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_valid() {
        assert_eq!(parse_date("2025-01-15").unwrap(), date(2025, 1, 15));
    }

    #[test]
    fn test_parse_date_rejects_loose_shapes() {
        assert_eq!(
            parse_date("2025-1-15"),
            Err(DateError::InvalidFormat("2025-1-15".to_string()))
        );
        assert!(matches!(
            parse_date("2025/01/15"),
            Err(DateError::InvalidFormat(_))
        ));
        assert!(matches!(parse_date(""), Err(DateError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_date_rejects_impossible_dates() {
        assert_eq!(
            parse_date("2025-02-30"),
            Err(DateError::InvalidDate("2025-02-30".to_string()))
        );
    }

    #[test]
    fn test_format_date_pads() {
        assert_eq!(format_date(date(2025, 3, 7)), "2025-03-07");
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2025, 1, 15), date(2025, 1, 20)), 5);
        assert_eq!(days_between(date(2025, 1, 20), date(2025, 1, 15)), -5);
        assert_eq!(days_between(date(2024, 12, 31), date(2025, 1, 1)), 1);
    }

    #[test]
    fn test_today_uses_clock() {
        let clock = ManualClock::at_date(date(2025, 1, 15));
        assert_eq!(today(&clock), "2025-01-15");
    }
}
