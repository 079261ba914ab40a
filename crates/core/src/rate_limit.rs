//! Job-creation throttling.
//!
//! A counter check at enqueue time, not a concurrency primitive: the
//! repository supplies how many jobs the requesting user created in the
//! last hour/day and how many are currently active, and this module
//! decides whether one more is allowed.

use crate::error::CoreError;

/// Per-user job-creation caps.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum jobs created per rolling hour.
    pub max_per_hour: i64,
    /// Maximum jobs created per rolling day.
    pub max_per_day: i64,
    /// Maximum simultaneously active (Pending or Running) jobs.
    pub max_active: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_hour: 5,
            max_per_day: 20,
            max_active: 3,
        }
    }
}

/// Current counters for one user, as read from the job table.
#[derive(Debug, Clone, Copy)]
pub struct UsageCounters {
    pub created_last_hour: i64,
    pub created_last_day: i64,
    pub active: i64,
}

/// Decide whether the user may enqueue one more job.
///
/// The first exceeded cap wins; the message names the cap so the caller
/// can surface it directly.
pub fn check_enqueue(config: &RateLimitConfig, usage: &UsageCounters) -> Result<(), CoreError> {
    if usage.active >= config.max_active {
        return Err(CoreError::RateLimited(format!(
            "{} jobs already active (limit {})",
            usage.active, config.max_active
        )));
    }
    if usage.created_last_hour >= config.max_per_hour {
        return Err(CoreError::RateLimited(format!(
            "{} jobs created in the last hour (limit {})",
            usage.created_last_hour, config.max_per_hour
        )));
    }
    if usage.created_last_day >= config.max_per_day {
        return Err(CoreError::RateLimited(format!(
            "{} jobs created in the last day (limit {})",
            usage.created_last_day, config.max_per_day
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(hour: i64, day: i64, active: i64) -> UsageCounters {
        UsageCounters {
            created_last_hour: hour,
            created_last_day: day,
            active,
        }
    }

    #[test]
    fn under_all_caps_is_allowed() {
        let config = RateLimitConfig::default();
        assert!(check_enqueue(&config, &usage(0, 0, 0)).is_ok());
        assert!(check_enqueue(&config, &usage(4, 19, 2)).is_ok());
    }

    #[test]
    fn hourly_cap_blocks() {
        let config = RateLimitConfig::default();
        let err = check_enqueue(&config, &usage(5, 5, 0)).unwrap_err();
        assert!(err.to_string().contains("hour"));
    }

    #[test]
    fn daily_cap_blocks() {
        let config = RateLimitConfig::default();
        let err = check_enqueue(&config, &usage(0, 20, 0)).unwrap_err();
        assert!(err.to_string().contains("day"));
    }

    #[test]
    fn active_cap_blocks_first() {
        let config = RateLimitConfig::default();
        let err = check_enqueue(&config, &usage(5, 20, 3)).unwrap_err();
        assert!(err.to_string().contains("active"));
    }
}
