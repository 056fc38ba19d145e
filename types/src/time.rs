//! Epoch-millisecond clock.
//!
//! All TTLs and rolling windows in the engine are computed on `i64`
//! epoch-ms so tests can inject timestamps instead of sleeping.

use chrono::Utc;

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(now_ms() > 1_704_067_200_000);
    }
}
