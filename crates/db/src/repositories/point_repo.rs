//! Repository for the `monitoring_points` table.

use groundwatch_core::error::CoreError;
use groundwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::point::MonitoringPoint;

/// Column list for `monitoring_points` queries.
const COLUMNS: &str = "id, infrastructure_id, name, longitude, latitude, created_at";

/// Provides reads (and the one write the CRUD layer delegates) for
/// monitoring points.
pub struct PointRepo;

impl PointRepo {
    /// All points of an infrastructure, stable order.
    pub async fn list_by_infrastructure(
        pool: &PgPool,
        infrastructure_id: DbId,
    ) -> Result<Vec<MonitoringPoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM monitoring_points \
             WHERE infrastructure_id = $1 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, MonitoringPoint>(&query)
            .bind(infrastructure_id)
            .fetch_all(pool)
            .await
    }

    /// Find a point by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MonitoringPoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM monitoring_points WHERE id = $1");
        sqlx::query_as::<_, MonitoringPoint>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Create a point after validating the coordinate ranges.
    ///
    /// Points are immutable once created; there is no update method.
    pub async fn create(
        pool: &PgPool,
        infrastructure_id: DbId,
        name: &str,
        longitude: f64,
        latitude: f64,
    ) -> Result<MonitoringPoint, CoreError> {
        validate_coordinate(longitude, latitude)?;

        let query = format!(
            "INSERT INTO monitoring_points (infrastructure_id, name, longitude, latitude) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MonitoringPoint>(&query)
            .bind(infrastructure_id)
            .bind(name)
            .bind(longitude)
            .bind(latitude)
            .fetch_one(pool)
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))
    }
}

/// WGS84 range check, mirrored by a database CHECK constraint.
fn validate_coordinate(longitude: f64, latitude: f64) -> Result<(), CoreError> {
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(CoreError::Validation(format!(
            "Invalid longitude: {longitude}"
        )));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(CoreError::Validation(format!("Invalid latitude: {latitude}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_ranges_enforced() {
        assert!(validate_coordinate(4.5, 44.5).is_ok());
        assert!(validate_coordinate(-180.0, 90.0).is_ok());
        assert!(validate_coordinate(181.0, 0.0).is_err());
        assert!(validate_coordinate(0.0, -91.0).is_err());
    }
}
