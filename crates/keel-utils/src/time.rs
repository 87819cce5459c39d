use chrono::{DateTime, Utc};

/// Current time as unix seconds rendered as a string, the format used for
/// repository `last_update` stamps.
pub fn unix_timestamp() -> String {
    Utc::now().timestamp().to_string()
}

/// Renders a unix-seconds string as a human readable UTC date.
///
/// Unparseable input is returned unchanged.
///
/// # Examples
///
/// ```
/// use keel_utils::time::format_unix_timestamp;
///
/// assert_eq!(format_unix_timestamp("0"), "1970-01-01 00:00:00 UTC");
/// ```
pub fn format_unix_timestamp(stamp: &str) -> String {
    stamp
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| stamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_timestamp_is_numeric() {
        let stamp = unix_timestamp();
        assert!(stamp.parse::<i64>().unwrap() > 1_600_000_000);
    }

    #[test]
    fn test_format_unix_timestamp() {
        assert_eq!(
            format_unix_timestamp("1700000000"),
            "2023-11-14 22:13:20 UTC"
        );
        assert_eq!(format_unix_timestamp("not-a-time"), "not-a-time");
    }
}
