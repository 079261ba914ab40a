//! Router assembly.

use axum::routing::get;
use axum::{Json, Router};

use crate::response::DataResponse;
use crate::routes;
use crate::state::AppState;

/// Build the full application router.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/jobs", routes::jobs::router())
        .nest("/api/v1/schedules", routes::schedules::router())
        .nest("/api/v1/infrastructures", routes::velocities::router())
        .with_state(state)
}

/// GET /health: process liveness (no database round trip).
async fn health() -> Json<DataResponse<&'static str>> {
    Json(DataResponse { data: "ok" })
}
