//! Deformation-measurement entity models and DTOs.

use chrono::NaiveDate;
use groundwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `deformation_measurements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeformationMeasurement {
    pub id: DbId,
    pub point_id: DbId,
    pub job_id: DbId,
    /// Acquisition date of the underlying radar product.
    pub measured_on: NaiveDate,
    pub displacement_mm: f64,
    /// Fitted rate from the latest velocity estimate, if any.
    pub velocity_mm_yr: Option<f64>,
    /// Radar phase quality weight in [0, 1].
    pub coherence: Option<f64>,
    /// Versioned regression diagnostics (serialized `VelocityEstimate`).
    pub diagnostics: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Upsert payload for one sampled value.
#[derive(Debug, Clone)]
pub struct NewMeasurement {
    pub point_id: DbId,
    pub job_id: DbId,
    pub measured_on: NaiveDate,
    pub displacement_mm: f64,
    pub coherence: Option<f64>,
}

/// Slim series row fed to the velocity engine.
#[derive(Debug, Clone, FromRow)]
pub struct MeasurementSeriesRow {
    pub measured_on: NaiveDate,
    pub displacement_mm: f64,
    pub coherence: Option<f64>,
}
