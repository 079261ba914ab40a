//! Repository for the `deformation_measurements` table.
//!
//! Writes go through [`MeasurementRepo::upsert`], keyed on
//! `(point_id, job_id, measured_on)`: re-running a job overwrites its own
//! rows instead of duplicating or crashing, which is what makes worker
//! retries safe.

use chrono::NaiveDate;
use groundwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::measurement::{DeformationMeasurement, MeasurementSeriesRow, NewMeasurement};

/// Column list for `deformation_measurements` queries.
const COLUMNS: &str = "\
    id, point_id, job_id, measured_on, displacement_mm, velocity_mm_yr, \
    coherence, diagnostics, created_at, updated_at";

/// Provides persistence for per-point displacement samples.
pub struct MeasurementRepo;

impl MeasurementRepo {
    /// Insert-or-overwrite one measurement.
    ///
    /// The unique constraint `uq_measurements_point_job_date` makes this
    /// idempotent: applying the same write twice yields one row holding
    /// the latest value.
    pub async fn upsert(
        pool: &PgPool,
        m: &NewMeasurement,
    ) -> Result<DeformationMeasurement, sqlx::Error> {
        let query = format!(
            "INSERT INTO deformation_measurements \
                 (point_id, job_id, measured_on, displacement_mm, coherence) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_measurements_point_job_date \
             DO UPDATE SET \
                 displacement_mm = EXCLUDED.displacement_mm, \
                 coherence = EXCLUDED.coherence, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeformationMeasurement>(&query)
            .bind(m.point_id)
            .bind(m.job_id)
            .bind(m.measured_on)
            .bind(m.displacement_mm)
            .bind(m.coherence)
            .fetch_one(pool)
            .await
    }

    /// Full measurement series for a point, oldest first.
    ///
    /// When two jobs measured the same date, the most recently updated
    /// row wins, so the velocity engine always reads one value per date.
    pub async fn series_for_point(
        pool: &PgPool,
        point_id: DbId,
    ) -> Result<Vec<MeasurementSeriesRow>, sqlx::Error> {
        sqlx::query_as::<_, MeasurementSeriesRow>(
            "SELECT DISTINCT ON (measured_on) measured_on, displacement_mm, coherence \
             FROM deformation_measurements \
             WHERE point_id = $1 \
             ORDER BY measured_on ASC, updated_at DESC",
        )
        .bind(point_id)
        .fetch_all(pool)
        .await
    }

    /// The point's most recent measurement row, if any.
    pub async fn latest_for_point(
        pool: &PgPool,
        point_id: DbId,
    ) -> Result<Option<DeformationMeasurement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM deformation_measurements \
             WHERE point_id = $1 \
             ORDER BY measured_on DESC, updated_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, DeformationMeasurement>(&query)
            .bind(point_id)
            .fetch_optional(pool)
            .await
    }

    /// Attach a velocity estimate to a measurement row.
    ///
    /// `diagnostics` is the serialized, versioned estimate; the flat
    /// `velocity_mm_yr` column is duplicated for cheap dashboard reads.
    pub async fn set_diagnostics(
        pool: &PgPool,
        measurement_id: DbId,
        velocity_mm_yr: f64,
        diagnostics: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE deformation_measurements \
             SET velocity_mm_yr = $2, diagnostics = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(measurement_id)
        .bind(velocity_mm_yr)
        .bind(diagnostics)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete all measurements a job produced (cancellation cascade).
    pub async fn delete_for_job(pool: &PgPool, job_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM deformation_measurements WHERE job_id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of distinct measurement dates for a point.
    pub async fn count_dates_for_point(
        pool: &PgPool,
        point_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT measured_on) FROM deformation_measurements WHERE point_id = $1",
        )
        .bind(point_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Point IDs that received a measurement from the given job on the
    /// given date (used to scope velocity recomputation).
    pub async fn point_ids_for_job_date(
        pool: &PgPool,
        job_id: DbId,
        measured_on: NaiveDate,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT point_id FROM deformation_measurements \
             WHERE job_id = $1 AND measured_on = $2",
        )
        .bind(job_id)
        .bind(measured_on)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
