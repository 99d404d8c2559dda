//! Time and timestamp helpers.

use chrono::{DateTime, Duration, Utc};

/// UTC timestamp used for `created_at`, `last_synced_at`, event times, etc.
pub type Timestamp = DateTime<Utc>;

/// How far back a first sync reaches when no previous sync exists.
pub const DEFAULT_SYNC_LOOKBACK_HOURS: i64 = 24;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Start of the window a sync should pull: the last successful sync, or
/// [`DEFAULT_SYNC_LOOKBACK_HOURS`] before `now` for a first sync.
#[must_use]
pub fn sync_window_start(last_synced_at: Option<Timestamp>, now: Timestamp) -> Timestamp {
    last_synced_at.unwrap_or_else(|| now - Duration::hours(DEFAULT_SYNC_LOOKBACK_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_start_window_at_last_sync_when_present() {
        let last = Utc::now() - Duration::minutes(5);
        assert_eq!(sync_window_start(Some(last), Utc::now()), last);
    }

    #[test]
    fn should_look_back_a_day_on_first_sync() {
        let now = Utc::now();
        assert_eq!(sync_window_start(None, now), now - Duration::hours(24));
    }
}
