//! # Time Utilities
//!
//! On-chain timestamps are unix seconds; these helpers turn them into display strings.

use chrono::{DateTime, Utc};

/// Current unix time in seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Format unix seconds as a calendar date (`YYYY-MM-DD`, UTC).
///
/// Out-of-range timestamps are returned as the raw number.
pub fn format_date(unix_secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(unix_secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => unix_secs.to_string(),
    }
}

/// Format unix seconds as an RFC3339 string.
pub fn format_timestamp(unix_secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(unix_secs, 0) {
        Some(dt) => dt.to_rfc3339(),
        None => unix_secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_subscription_end_date() {
        // 2024-03-01T00:00:00Z
        assert_eq!(format_date(1_709_251_200), "2024-03-01");
    }

    #[test]
    fn formats_rfc3339() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn out_of_range_falls_back_to_number() {
        assert_eq!(format_date(i64::MAX), i64::MAX.to_string());
    }
}
