//! Handlers for the `/jobs` resource.
//!
//! The `requested_by` field identifies the principal; the auth layer in
//! front of this service fills it in after token verification.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use groundwatch_core::error::CoreError;
use groundwatch_core::job_states;
use groundwatch_core::rate_limit;
use groundwatch_core::submission::{self, DateSelection};
use groundwatch_core::types::DbId;
use groundwatch_db::models::job::JobListQuery;
use groundwatch_db::repositories::{InfrastructureRepo, JobRepo, MeasurementRepo, PointRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct EnqueueJobRequest {
    pub infrastructure_id: DbId,
    /// Principal on whose behalf the job runs (set by the auth layer).
    pub requested_by: DbId,
    pub date_selection: DateSelection,
}

// ---------------------------------------------------------------------------
// Enqueue
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Resolve the date selection into a submission spec and create a
/// pending job. Returns 201 with the created job, 429 when the caller
/// is over a job-creation cap.
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(input): Json<EnqueueJobRequest>,
) -> AppResult<impl IntoResponse> {
    // Throttle before doing any heavier work.
    let usage = JobRepo::usage_counters(&state.pool, input.requested_by).await?;
    rate_limit::check_enqueue(&state.config.rate_limit, &usage)?;

    let infrastructure = InfrastructureRepo::find_by_id(&state.pool, input.infrastructure_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Infrastructure",
            id: input.infrastructure_id,
        }))?;

    let points = PointRepo::list_by_infrastructure(&state.pool, input.infrastructure_id)
        .await?
        .iter()
        .map(|p| p.coord())
        .collect();

    let spec = submission::resolve(infrastructure.bounds(), points, &input.date_selection)?;
    let spec_json = serde_json::to_value(&spec)
        .map_err(|e| AppError::InternalError(format!("Spec serialization failed: {e}")))?;

    let job = JobRepo::enqueue(
        &state.pool,
        input.infrastructure_id,
        None,
        input.requested_by,
        &spec_json,
    )
    .await?;

    tracing::info!(
        job_id = job.id,
        infrastructure_id = job.infrastructure_id,
        requested_by = input.requested_by,
        "Job enqueued",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// List jobs with optional `status_id`, `infrastructure_id`, `limit`,
/// and `offset` query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = JobRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancel a pending or running job. The worker observes the status flip
/// before its next side-effecting step. Returns 204 on success, 409 if
/// the job is already terminal.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    // 404 before 409: a missing job is not a conflict.
    JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    let cancelled = JobRepo::cancel(&state.pool, job_id, "Cancelled by operator").await?;
    if !cancelled {
        return Err(AppError::Core(CoreError::Conflict(
            "Job is already in a terminal state".to_string(),
        )));
    }

    // Cancellation cascade: a cancelled job keeps no measurements.
    let deleted = MeasurementRepo::delete_for_job(&state.pool, job_id).await?;
    tracing::info!(job_id, deleted_measurements = deleted, "Job cancelled");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/jobs/{id}/retry`.
#[derive(Debug, Deserialize)]
pub struct RetryJobRequest {
    /// Principal requesting the retry (set by the auth layer).
    pub requested_by: DbId,
}

/// POST /api/v1/jobs/{id}/retry
///
/// Create a fresh pending job from a terminal job's submission spec.
/// This is the only path that re-runs a terminal job; the original row
/// is never resurrected. Returns 201 with the new job.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
    Json(input): Json<RetryJobRequest>,
) -> AppResult<impl IntoResponse> {
    let original = JobRepo::find_by_id(&state.pool, job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    if !job_states::is_terminal(original.status_id) {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Job is still {}; cancel it before retrying",
            job_states::status_name(original.status_id)
        ))));
    }

    // A retry is a new enqueue as far as throttling is concerned.
    let usage = JobRepo::usage_counters(&state.pool, input.requested_by).await?;
    rate_limit::check_enqueue(&state.config.rate_limit, &usage)?;

    let job = JobRepo::retry(&state.pool, job_id, input.requested_by).await?;

    tracing::info!(job_id = job.id, retry_of = job_id, "Job retried");
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}
