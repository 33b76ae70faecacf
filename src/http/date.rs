//! RFC 1123 dates, as used by `Date`, `Expires` and `Last-Modified`.

use chrono::{DateTime, Utc};

/// Format `at` as an RFC 1123 HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// [`http_date`] for the current instant.
pub fn http_date_now() -> String {
    http_date(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc1123_format() {
        let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(at), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_single_digit_day_is_padded() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 5).unwrap();
        assert_eq!(http_date(at), "Sun, 01 Mar 2026 00:00:05 GMT");
    }
}
