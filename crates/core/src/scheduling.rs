//! Recurring-schedule cadence math.
//!
//! Pure functions shared by the schedule engine and the API handlers.
//! The engine itself (the tick loop) lives in the worker crate; what is
//! here answers "when does this schedule fire next".

use crate::error::CoreError;
use crate::types::Timestamp;

/// Smallest allowed cadence. Sentinel-class revisit times make anything
/// shorter than 6 days produce no new acquisitions.
pub const MIN_FREQUENCY_DAYS: i32 = 6;

/// Largest allowed cadence.
pub const MAX_FREQUENCY_DAYS: i32 = 365;

/// Validate a schedule cadence in days.
pub fn validate_frequency(frequency_days: i32) -> Result<(), CoreError> {
    if !(MIN_FREQUENCY_DAYS..=MAX_FREQUENCY_DAYS).contains(&frequency_days) {
        return Err(CoreError::Validation(format!(
            "frequency_days must be between {MIN_FREQUENCY_DAYS} and {MAX_FREQUENCY_DAYS}, got {frequency_days}"
        )));
    }
    Ok(())
}

/// Next fire time after a run at `ran_at`.
pub fn next_run_after(ran_at: Timestamp, frequency_days: i32) -> Timestamp {
    ran_at + chrono::Duration::days(i64::from(frequency_days))
}

/// True when a schedule is due: active and `next_run_at` has passed.
pub fn is_due(is_active: bool, next_run_at: Timestamp, now: Timestamp) -> bool {
    is_active && next_run_at <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(y: i32, m: u32, d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn twelve_day_cadence() {
        let next = next_run_after(ts(2024, 1, 1), 12);
        assert_eq!(next, ts(2024, 1, 13));
    }

    #[test]
    fn cadence_crosses_month_boundary() {
        let next = next_run_after(ts(2024, 1, 25), 12);
        assert_eq!(next, ts(2024, 2, 6));
    }

    #[test]
    fn due_exactly_at_next_run() {
        let t = ts(2024, 3, 1);
        assert!(is_due(true, t, t));
    }

    #[test]
    fn not_due_before_next_run() {
        assert!(!is_due(true, ts(2024, 3, 2), ts(2024, 3, 1)));
    }

    #[test]
    fn paused_schedule_is_never_due() {
        assert!(!is_due(false, ts(2024, 3, 1), ts(2024, 3, 2)));
    }

    #[test]
    fn frequency_bounds() {
        assert!(validate_frequency(6).is_ok());
        assert!(validate_frequency(365).is_ok());
        assert!(validate_frequency(5).is_err());
        assert!(validate_frequency(366).is_err());
    }
}
