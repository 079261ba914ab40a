//! Route definitions for velocity recomputation.

use axum::routing::post;
use axum::Router;

use crate::handlers::velocities;
use crate::state::AppState;

/// Routes mounted at `/infrastructures`.
///
/// ```text
/// POST /{id}/recompute-velocities -> recompute_velocities
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{id}/recompute-velocities",
        post(velocities::recompute_velocities),
    )
}
