//! Monitoring-point entity model.

use groundwatch_core::raster::PointCoord;
use groundwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `monitoring_points` table. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MonitoringPoint {
    pub id: DbId,
    pub infrastructure_id: DbId,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub created_at: Timestamp,
}

impl MonitoringPoint {
    /// Coordinate in the shape the raster sampler consumes.
    pub fn coord(&self) -> PointCoord {
        PointCoord {
            point_id: self.id,
            longitude: self.longitude,
            latitude: self.latitude,
        }
    }
}
