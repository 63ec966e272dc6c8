//! strftime-style date and time decoding.
//!
//! A token is parsed against the configured format and merged into the
//! record's broken-down datetime: date-only formats keep the base time,
//! time-only formats keep the base date, and year-less syslog formats
//! inherit the year. `%s` parses epoch timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Parse `token` with a strftime `fmt`, merging missing halves from `base`.
pub fn str_to_time(token: &str, fmt: &str, base: NaiveDateTime) -> Option<NaiveDateTime> {
    let token = token.trim();
    if token.is_empty() || fmt.is_empty() {
        return None;
    }

    if fmt == "%s" {
        return epoch_to_datetime(token);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(token, fmt) {
        return Some(dt);
    }
    // offset-carrying formats keep the printed local time
    if let Ok(dt) = DateTime::parse_from_str(token, fmt) {
        return Some(dt.naive_local());
    }
    if let Ok(d) = NaiveDate::parse_from_str(token, fmt) {
        return Some(NaiveDateTime::new(d, base.time()));
    }
    if let Ok(t) = NaiveTime::parse_from_str(token, fmt) {
        return Some(NaiveDateTime::new(base.date(), t));
    }

    // year-less syslog formats ("Dec  2", "Dec  2 10:00:00") inherit the year
    let ytoken = format!("{} {}", base.format("%Y"), token);
    let yfmt = format!("%Y {}", fmt);
    if let Ok(dt) = NaiveDateTime::parse_from_str(&ytoken, &yfmt) {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(&ytoken, &yfmt) {
        return Some(NaiveDateTime::new(d, base.time()));
    }

    None
}

/// Epoch timestamps at second, millisecond, or microsecond resolution,
/// told apart by digit count.
fn epoch_to_datetime(token: &str) -> Option<NaiveDateTime> {
    let raw: i64 = token.parse().ok()?;
    let secs = match token.len() {
        0..=12 => raw,
        13..=15 => raw / 1_000,
        _ => raw / 1_000_000,
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Render `dt` with a strftime format, failing instead of panicking on a
/// bad format string.
pub fn format_datetime(dt: NaiveDateTime, fmt: &str) -> Option<String> {
    use std::fmt::Write;
    let mut out = String::new();
    write!(out, "{}", dt.format(fmt)).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 1)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap()
    }

    #[test]
    fn test_clf_date() {
        let dt = str_to_time("10/Oct/2000", "%d/%b/%Y", base()).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2000, 10, 10).unwrap());
        // time inherited from base
        assert_eq!(dt.time(), base().time());
    }

    #[test]
    fn test_clf_time() {
        let dt = str_to_time("13:55:36", "%H:%M:%S", base()).unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (13, 55, 36));
        assert_eq!(dt.date(), base().date());
    }

    #[test]
    fn test_combined_datetime_with_offset() {
        let dt = str_to_time(
            "10/Oct/2000:13:55:36 -0700",
            "%d/%b/%Y:%H:%M:%S %z",
            base(),
        )
        .unwrap();
        // printed local time is kept, not shifted
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (13, 55, 36));
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2000, 10, 10).unwrap());
    }

    #[test]
    fn test_epoch_seconds() {
        let dt = str_to_time("971186136", "%s", base()).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2000, 10, 10).unwrap());
    }

    #[test]
    fn test_epoch_millis_and_micros() {
        let ms = str_to_time("1609459200000", "%s", base()).unwrap();
        assert_eq!(ms.date(), NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        let us = str_to_time("1609459200000000", "%s", base()).unwrap();
        assert_eq!(us.date(), NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
    }

    #[test]
    fn test_syslog_padded_date_inherits_year() {
        let dt = str_to_time("Dec  2", "%b %d", base()).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2026, 12, 2).unwrap());
        assert_eq!(dt.time(), base().time());
    }

    #[test]
    fn test_syslog_date_with_time() {
        let dt = str_to_time("Dec  2 10:03:22", "%b %d %H:%M:%S", base()).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2026, 12, 2).unwrap());
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 3, 22));
    }

    #[test]
    fn test_invalid_token() {
        assert!(str_to_time("not-a-date", "%d/%b/%Y", base()).is_none());
        assert!(str_to_time("", "%d/%b/%Y", base()).is_none());
    }

    #[test]
    fn test_format_datetime() {
        let s = format_datetime(base(), "%Y%m%d").unwrap();
        assert_eq!(s, "20260801");
    }
}
