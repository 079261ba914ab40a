//! Worker configuration loaded from environment variables.

use std::time::Duration;

use groundwatch_core::error::CoreError;
use groundwatch_core::raster::SampleConfig;
use groundwatch_insar::backoff::PollConfig;

/// Runtime configuration for the worker process.
///
/// All fields have defaults suitable for local development; production
/// overrides them via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrently executing jobs. A job holds its slot for its
    /// whole lifetime, poll waits included, so size this for the
    /// expected job duration, not just CPU.
    pub max_concurrent_jobs: usize,
    /// How often the dispatcher looks for claimable jobs.
    pub dispatch_interval: Duration,
    /// How often the schedule engine checks for due schedules.
    pub schedule_interval: Duration,
    /// Poll backoff policy for the external service.
    pub poll: PollConfig,
    /// Raster sampling tunables.
    pub sample: SampleConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            dispatch_interval: Duration::from_secs(5),
            schedule_interval: Duration::from_secs(60),
            poll: PollConfig::default(),
            sample: SampleConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `WORKER_MAX_CONCURRENT`    | `4`     |
    /// | `WORKER_DISPATCH_SECS`     | `5`     |
    /// | `WORKER_SCHEDULE_SECS`     | `60`    |
    /// | `POLL_INITIAL_DELAY_SECS`  | `5`     |
    /// | `POLL_MAX_DELAY_SECS`      | `60`    |
    /// | `POLL_MULTIPLIER`          | `2.0`   |
    /// | `POLL_JITTER_FRACTION`     | `0.2`   |
    /// | `POLL_MAX_ATTEMPTS`        | `240`   |
    /// | `POLL_BUDGET_SECS`         | `7200`  |
    /// | `SAMPLE_MAX_ABS_VALUE`     | `100.0` |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let poll = PollConfig {
            initial_delay: Duration::from_secs(env_parse(
                "POLL_INITIAL_DELAY_SECS",
                defaults.poll.initial_delay.as_secs(),
            )?),
            max_delay: Duration::from_secs(env_parse(
                "POLL_MAX_DELAY_SECS",
                defaults.poll.max_delay.as_secs(),
            )?),
            multiplier: env_parse("POLL_MULTIPLIER", defaults.poll.multiplier)?,
            jitter_fraction: env_parse("POLL_JITTER_FRACTION", defaults.poll.jitter_fraction)?,
            max_attempts: env_parse("POLL_MAX_ATTEMPTS", defaults.poll.max_attempts)?,
            overall_budget: Duration::from_secs(env_parse(
                "POLL_BUDGET_SECS",
                defaults.poll.overall_budget.as_secs(),
            )?),
        };
        poll.validate()?;

        Ok(Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_CONCURRENT", defaults.max_concurrent_jobs)?,
            dispatch_interval: Duration::from_secs(env_parse(
                "WORKER_DISPATCH_SECS",
                defaults.dispatch_interval.as_secs(),
            )?),
            schedule_interval: Duration::from_secs(env_parse(
                "WORKER_SCHEDULE_SECS",
                defaults.schedule_interval.as_secs(),
            )?),
            poll,
            sample: SampleConfig {
                max_abs_value: env_parse("SAMPLE_MAX_ABS_VALUE", defaults.sample.max_abs_value)?,
            },
        })
    }
}

/// Parse an env var, falling back to the default when unset.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}
