//! Job-schedule entity models and DTOs.

use groundwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `job_schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobSchedule {
    pub id: DbId,
    pub infrastructure_id: DbId,
    pub requested_by: DbId,
    pub frequency_days: i32,
    pub is_active: bool,
    pub last_run_at: Option<Timestamp>,
    pub next_run_at: Timestamp,
    pub total_runs: i32,
    pub successful_runs: i32,
    pub failed_runs: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a schedule.
#[derive(Debug, Deserialize)]
pub struct CreateSchedule {
    pub infrastructure_id: DbId,
    pub requested_by: DbId,
    /// Cadence in days between automatic runs.
    pub frequency_days: i32,
}
