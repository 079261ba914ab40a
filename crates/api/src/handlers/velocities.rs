//! Manual velocity recomputation.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use groundwatch_core::error::CoreError;
use groundwatch_core::types::DbId;
use groundwatch_db::repositories::{InfrastructureRepo, PointRepo};
use groundwatch_worker::runner::recompute_point_velocity;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body of a recomputation run.
#[derive(Debug, Serialize)]
pub struct RecomputeResult {
    /// Points whose estimate was recomputed and written.
    pub updated: usize,
    /// Points skipped for insufficient history.
    pub skipped: usize,
}

/// POST /api/v1/infrastructures/{id}/recompute-velocities
///
/// Run the velocity engine over every monitoring point of the
/// infrastructure, regardless of whether new measurements arrived.
/// Returns how many points were updated.
pub async fn recompute_velocities(
    State(state): State<AppState>,
    Path(infrastructure_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    InfrastructureRepo::find_by_id(&state.pool, infrastructure_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Infrastructure",
            id: infrastructure_id,
        }))?;

    let points = PointRepo::list_by_infrastructure(&state.pool, infrastructure_id).await?;

    let mut updated = 0usize;
    let mut skipped = 0usize;
    for point in &points {
        if recompute_point_velocity(&state.pool, point.id).await? {
            updated += 1;
        } else {
            skipped += 1;
        }
    }

    tracing::info!(infrastructure_id, updated, skipped, "Velocities recomputed");
    Ok(Json(DataResponse {
        data: RecomputeResult { updated, skipped },
    }))
}
