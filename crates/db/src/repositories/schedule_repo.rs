//! Repository for the `job_schedules` table.
//!
//! Firing is a single atomic UPDATE: due rows are locked with
//! `FOR UPDATE SKIP LOCKED`, advanced to their next run time, and
//! returned, so two scheduler instances never fire the same row twice.

use groundwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::schedule::{CreateSchedule, JobSchedule};

/// Column list for `job_schedules` queries.
const COLUMNS: &str = "\
    id, infrastructure_id, requested_by, frequency_days, is_active, \
    last_run_at, next_run_at, total_runs, successful_runs, failed_runs, \
    created_at, updated_at";

/// Provides CRUD and firing operations for recurring schedules.
pub struct ScheduleRepo;

impl ScheduleRepo {
    /// Create an active schedule; the first run is one cadence from now.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSchedule,
    ) -> Result<JobSchedule, sqlx::Error> {
        let query = format!(
            "INSERT INTO job_schedules \
                 (infrastructure_id, requested_by, frequency_days, next_run_at) \
             VALUES ($1, $2, $3, NOW() + make_interval(days => $3)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobSchedule>(&query)
            .bind(input.infrastructure_id)
            .bind(input.requested_by)
            .bind(input.frequency_days)
            .fetch_one(pool)
            .await
    }

    /// Find a schedule by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<JobSchedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_schedules WHERE id = $1");
        sqlx::query_as::<_, JobSchedule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all schedules, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<JobSchedule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM job_schedules ORDER BY created_at DESC");
        sqlx::query_as::<_, JobSchedule>(&query).fetch_all(pool).await
    }

    /// Claim and advance every due schedule in one statement.
    ///
    /// Each returned row has already had `last_run_at`, `next_run_at`,
    /// and `total_runs` updated; the caller's only remaining duty is to
    /// enqueue one job per row.
    pub async fn fire_due(pool: &PgPool) -> Result<Vec<JobSchedule>, sqlx::Error> {
        let query = format!(
            "UPDATE job_schedules \
             SET last_run_at = NOW(), \
                 next_run_at = NOW() + make_interval(days => frequency_days), \
                 total_runs = total_runs + 1, \
                 updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM job_schedules \
                 WHERE is_active AND next_run_at <= NOW() \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobSchedule>(&query).fetch_all(pool).await
    }

    /// Record the outcome of a schedule-owned job run.
    pub async fn record_outcome(
        pool: &PgPool,
        schedule_id: DbId,
        success: bool,
    ) -> Result<(), sqlx::Error> {
        let column = if success {
            "successful_runs"
        } else {
            "failed_runs"
        };
        let query = format!(
            "UPDATE job_schedules \
             SET {column} = {column} + 1, updated_at = NOW() \
             WHERE id = $1"
        );
        sqlx::query(&query).bind(schedule_id).execute(pool).await?;
        Ok(())
    }

    /// Pause a schedule. Counters and `next_run_at` are left untouched.
    pub async fn pause(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_schedules SET is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resume a paused schedule, re-anchoring the next run to now.
    pub async fn resume(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE job_schedules \
             SET is_active = TRUE, \
                 next_run_at = NOW() + make_interval(days => frequency_days), \
                 updated_at = NOW() \
             WHERE id = $1 AND NOT is_active",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a schedule. Jobs it fired keep running; their
    /// `schedule_id` is nulled by the foreign key.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM job_schedules WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
