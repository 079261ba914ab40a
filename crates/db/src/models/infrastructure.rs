//! Infrastructure entity model.
//!
//! CRUD for infrastructures lives outside this core; the pipeline only
//! reads the bounding box when building a submission spec.

use groundwatch_core::raster::GeoBounds;
use groundwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `infrastructures` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Infrastructure {
    pub id: DbId,
    pub name: String,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub created_at: Timestamp,
}

impl Infrastructure {
    /// Geographic bounding box of the monitored area.
    pub fn bounds(&self) -> GeoBounds {
        GeoBounds {
            west: self.min_lon,
            south: self.min_lat,
            east: self.max_lon,
            north: self.max_lat,
        }
    }
}
