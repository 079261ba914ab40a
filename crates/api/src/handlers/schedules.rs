//! Handlers for the `/schedules` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use groundwatch_core::error::CoreError;
use groundwatch_core::scheduling;
use groundwatch_core::types::DbId;
use groundwatch_db::models::schedule::CreateSchedule;
use groundwatch_db::repositories::{InfrastructureRepo, ScheduleRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Fetch a schedule or 404.
async fn find_schedule(
    pool: &sqlx::PgPool,
    schedule_id: DbId,
) -> AppResult<groundwatch_db::models::schedule::JobSchedule> {
    ScheduleRepo::find_by_id(pool, schedule_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Schedule",
            id: schedule_id,
        }))
}

// ---------------------------------------------------------------------------
// Create / list / get
// ---------------------------------------------------------------------------

/// POST /api/v1/schedules
///
/// Create an active recurring schedule; the first run fires one cadence
/// from now. Returns 201 with the created schedule.
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(input): Json<CreateSchedule>,
) -> AppResult<impl IntoResponse> {
    scheduling::validate_frequency(input.frequency_days)?;

    InfrastructureRepo::find_by_id(&state.pool, input.infrastructure_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Infrastructure",
            id: input.infrastructure_id,
        }))?;

    let schedule = ScheduleRepo::create(&state.pool, &input).await?;

    tracing::info!(
        schedule_id = schedule.id,
        infrastructure_id = schedule.infrastructure_id,
        frequency_days = schedule.frequency_days,
        "Schedule created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: schedule })))
}

/// GET /api/v1/schedules
pub async fn list_schedules(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let schedules = ScheduleRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: schedules }))
}

/// GET /api/v1/schedules/{id}
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let schedule = find_schedule(&state.pool, schedule_id).await?;
    Ok(Json(DataResponse { data: schedule }))
}

// ---------------------------------------------------------------------------
// Pause / resume / delete
// ---------------------------------------------------------------------------

/// POST /api/v1/schedules/{id}/pause
///
/// Deactivate a schedule without touching its counters or next-run
/// time. Returns 204, or 409 when already paused.
pub async fn pause_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_schedule(&state.pool, schedule_id).await?;

    let paused = ScheduleRepo::pause(&state.pool, schedule_id).await?;
    if !paused {
        return Err(AppError::Core(CoreError::Conflict(
            "Schedule is already paused".to_string(),
        )));
    }

    tracing::info!(schedule_id, "Schedule paused");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/schedules/{id}/resume
///
/// Reactivate a paused schedule; the next run is one cadence from now,
/// not from the pre-pause schedule. Returns 204, or 409 when already
/// active.
pub async fn resume_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_schedule(&state.pool, schedule_id).await?;

    let resumed = ScheduleRepo::resume(&state.pool, schedule_id).await?;
    if !resumed {
        return Err(AppError::Core(CoreError::Conflict(
            "Schedule is already active".to_string(),
        )));
    }

    tracing::info!(schedule_id, "Schedule resumed");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/schedules/{id}
///
/// Delete a schedule. Jobs it already fired are unaffected. Returns 204.
pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    find_schedule(&state.pool, schedule_id).await?;
    ScheduleRepo::delete(&state.pool, schedule_id).await?;

    tracing::info!(schedule_id, "Schedule deleted");
    Ok(StatusCode::NO_CONTENT)
}
