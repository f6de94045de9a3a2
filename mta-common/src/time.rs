//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Add whole days, saturating at the maximum representable instant
pub fn add_days(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    chrono::Duration::try_days(days)
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        // After 2020-01-01 and before 2100-01-01
        assert!(timestamp.timestamp() > 1_577_836_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }

    #[test]
    fn test_now_ms_matches_now() {
        let a = now_ms();
        let b = now().timestamp_millis();
        assert!((b - a).abs() < 1000);
    }

    #[test]
    fn test_add_days() {
        let start = Utc.with_ymd_and_hms(2025, 1, 30, 12, 0, 0).unwrap();
        let end = add_days(start, 30);
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_add_days_saturates() {
        let end = add_days(now(), i64::MAX / 2);
        assert_eq!(end, DateTime::<Utc>::MAX_UTC);
    }
}
