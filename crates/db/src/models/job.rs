//! Processing-job entity models and DTOs.

use groundwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// A row from the `processing_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessingJob {
    pub id: DbId,
    pub infrastructure_id: DbId,
    /// Set when the job was fired by a recurring schedule.
    pub schedule_id: Option<DbId>,
    pub requested_by: DbId,
    pub status_id: StatusId,
    /// Handle assigned by the external processing service; null until
    /// the job has been submitted.
    pub external_ref: Option<String>,
    /// Canonical submission spec resolved at enqueue time.
    pub submission_spec: serde_json::Value,
    pub error_reason: Option<String>,
    /// Harvest statistics recorded on success.
    pub statistics: Option<serde_json::Value>,
    pub retry_of_job_id: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    pub submitted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Query parameters for job listings.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status ID (e.g. 1 = pending, 4 = failed).
    pub status_id: Option<StatusId>,
    /// Filter by owning infrastructure.
    pub infrastructure_id: Option<DbId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
