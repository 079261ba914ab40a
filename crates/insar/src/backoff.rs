//! Poll backoff policy for the job worker.
//!
//! Polling starts fast and backs off exponentially with jitter so a
//! fleet of workers does not hammer the service in lockstep. The
//! parameters are configuration, not constants: deployments tune them
//! against their service tier.

use std::time::Duration;

use groundwatch_core::error::CoreError;
use rand::Rng;

/// Tunable parameters for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first status poll.
    pub initial_delay: Duration,
    /// Upper bound on the delay between polls.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each poll.
    pub multiplier: f64,
    /// Fraction of the delay randomized on each wait, in [0, 1).
    pub jitter_fraction: f64,
    /// Maximum number of status polls per job.
    pub max_attempts: u32,
    /// Overall wall-clock budget for one job.
    pub overall_budget: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_fraction: 0.2,
            max_attempts: 240,
            overall_budget: Duration::from_secs(2 * 3600),
        }
    }
}

impl PollConfig {
    /// Validate the parameters instead of trusting deployment config.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.initial_delay.is_zero() {
            return Err(CoreError::Validation(
                "initial_delay must be positive".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(CoreError::Validation(
                "max_delay must be >= initial_delay".to_string(),
            ));
        }
        if self.multiplier < 1.0 {
            return Err(CoreError::Validation(
                "multiplier must be >= 1.0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(CoreError::Validation(
                "jitter_fraction must be in [0, 1)".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(CoreError::Validation(
                "max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`PollConfig::max_delay`].
pub fn next_delay(current: Duration, config: &PollConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Randomize a delay by the configured jitter fraction.
///
/// The result lies in `[delay * (1 - f), delay * (1 + f)]`.
pub fn with_jitter(delay: Duration, config: &PollConfig) -> Duration {
    if config.jitter_fraction <= 0.0 {
        return delay;
    }
    let f = config.jitter_fraction;
    let factor = rand::rng().random_range((1.0 - f)..=(1.0 + f));
    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = PollConfig::default();
        let d = next_delay(Duration::from_secs(5), &config);
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = PollConfig {
            max_delay: Duration::from_secs(30),
            ..Default::default()
        };
        let d = next_delay(Duration::from_secs(25), &config);
        assert_eq!(d, Duration::from_secs(30));
    }

    #[test]
    fn next_delay_already_at_max() {
        let config = PollConfig::default();
        let d = next_delay(config.max_delay, &config);
        assert_eq!(d, config.max_delay);
    }

    #[test]
    fn full_backoff_sequence() {
        let config = PollConfig::default();
        let mut delay = config.initial_delay;
        let expected = [5, 10, 20, 40, 60, 60];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let config = PollConfig {
            jitter_fraction: 0.2,
            ..Default::default()
        };
        let base = Duration::from_secs(10);
        for _ in 0..200 {
            let jittered = with_jitter(base, &config);
            assert!(jittered >= Duration::from_secs(8), "{jittered:?}");
            assert!(jittered <= Duration::from_secs(12), "{jittered:?}");
        }
    }

    #[test]
    fn zero_jitter_is_identity() {
        let config = PollConfig {
            jitter_fraction: 0.0,
            ..Default::default()
        };
        assert_eq!(with_jitter(Duration::from_secs(7), &config), Duration::from_secs(7));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PollConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_configs_rejected() {
        let mut config = PollConfig::default();
        config.multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = PollConfig::default();
        config.jitter_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = PollConfig::default();
        config.max_delay = Duration::from_secs(1);
        assert!(config.validate().is_err());

        let mut config = PollConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
