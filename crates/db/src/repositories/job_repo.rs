//! Repository for the `processing_jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions.
//! Terminal transitions are guarded in SQL so a job can never leave
//! Succeeded/Failed/Cancelled; retry creates a fresh Pending row.

use groundwatch_core::rate_limit::UsageCounters;
use groundwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{JobListQuery, ProcessingJob};
use crate::models::status::{JobStatus, StatusId};

/// Column list for `processing_jobs` queries.
const COLUMNS: &str = "\
    id, infrastructure_id, schedule_id, requested_by, status_id, \
    external_ref, submission_spec, error_reason, statistics, \
    retry_of_job_id, claimed_at, submitted_at, completed_at, \
    created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 50;

/// Terminal statuses: succeeded, failed, cancelled.
const TERMINAL_STATUSES: [StatusId; 3] = [
    JobStatus::Succeeded as StatusId,
    JobStatus::Failed as StatusId,
    JobStatus::Cancelled as StatusId,
];

/// Provides CRUD operations for processing jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create a new pending job with its resolved submission spec.
    pub async fn enqueue(
        pool: &PgPool,
        infrastructure_id: DbId,
        schedule_id: Option<DbId>,
        requested_by: DbId,
        submission_spec: &serde_json::Value,
    ) -> Result<ProcessingJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO processing_jobs \
                 (infrastructure_id, schedule_id, requested_by, status_id, submission_spec) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(infrastructure_id)
            .bind(schedule_id)
            .bind(requested_by)
            .bind(JobStatus::Pending.id())
            .bind(submission_spec)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest unclaimed pending job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so several worker processes
    /// can poll the queue without double-claiming. The job stays Pending
    /// until the external service reports progress.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<ProcessingJob>, sqlx::Error> {
        let query = format!(
            "UPDATE processing_jobs \
             SET claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM processing_jobs \
                 WHERE status_id = $1 AND claimed_at IS NULL \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Record the handle returned by the external service at submission.
    pub async fn set_external_ref(
        pool: &PgPool,
        job_id: DbId,
        external_ref: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE processing_jobs \
             SET external_ref = $2, submitted_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(external_ref)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Advance a pending job to Running.
    ///
    /// Guarded on the current status; returns `false` when the job is no
    /// longer Pending (e.g. cancelled while the submission was in flight).
    pub async fn mark_running(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processing_jobs \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Running.id())
        .bind(JobStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as succeeded with its harvest statistics.
    pub async fn succeed(
        pool: &PgPool,
        job_id: DbId,
        statistics: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processing_jobs \
             SET status_id = $2, statistics = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $5, $6)",
        )
        .bind(job_id)
        .bind(JobStatus::Succeeded.id())
        .bind(statistics)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a job as failed with a human-readable reason.
    ///
    /// No automatic retry is performed. The job stays Failed until the
    /// operator explicitly retries, which creates a fresh job row.
    pub async fn fail(pool: &PgPool, job_id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processing_jobs \
             SET status_id = $2, error_reason = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $5, $6)",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(reason)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a job if it is not already in a terminal state.
    ///
    /// Returns `true` if the job was cancelled, `false` if it was already
    /// succeeded, failed, or cancelled.
    pub async fn cancel(pool: &PgPool, job_id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE processing_jobs \
             SET status_id = $2, error_reason = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $5, $6)",
        )
        .bind(job_id)
        .bind(JobStatus::Cancelled.id())
        .bind(reason)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Current status of a job. The worker checks this before every
    /// side-effecting step so a concurrent cancel takes effect promptly.
    pub async fn status(pool: &PgPool, job_id: DbId) -> Result<Option<StatusId>, sqlx::Error> {
        let row: Option<(StatusId,)> =
            sqlx::query_as("SELECT status_id FROM processing_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Create a new pending job from a failed/cancelled job's spec.
    ///
    /// The new job has `retry_of_job_id` pointing to the original. This
    /// is the ONLY way to re-run a terminal job.
    pub async fn retry(
        pool: &PgPool,
        job_id: DbId,
        requested_by: DbId,
    ) -> Result<ProcessingJob, sqlx::Error> {
        let original = Self::find_by_id(pool, job_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let query = format!(
            "INSERT INTO processing_jobs \
                 (infrastructure_id, schedule_id, requested_by, status_id, \
                  submission_spec, retry_of_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(original.infrastructure_id)
            .bind(original.schedule_id)
            .bind(requested_by)
            .bind(JobStatus::Pending.id())
            .bind(&original.submission_spec)
            .bind(job_id)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ProcessingJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM processing_jobs WHERE id = $1");
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs with optional status/infrastructure filters and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &JobListQuery,
    ) -> Result<Vec<ProcessingJob>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.infrastructure_id.is_some() {
            conditions.push(format!("infrastructure_id = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM processing_jobs \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, ProcessingJob>(&query);
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        if let Some(iid) = params.infrastructure_id {
            q = q.bind(iid);
        }
        q = q.bind(limit).bind(offset);

        q.fetch_all(pool).await
    }

    /// Rolling job-creation counters for the enqueue rate limit.
    pub async fn usage_counters(
        pool: &PgPool,
        requested_by: DbId,
    ) -> Result<UsageCounters, sqlx::Error> {
        let row: (i64, i64, i64) = sqlx::query_as(
            "SELECT \
                 COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '1 hour'), \
                 COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '1 day'), \
                 COUNT(*) FILTER (WHERE status_id IN ($2, $3)) \
             FROM processing_jobs WHERE requested_by = $1",
        )
        .bind(requested_by)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Running.id())
        .fetch_one(pool)
        .await?;

        Ok(UsageCounters {
            created_last_hour: row.0,
            created_last_day: row.1,
            active: row.2,
        })
    }
}
