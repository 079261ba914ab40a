//! Repository for the `infrastructures` table.
//!
//! The pipeline only reads; infrastructure CRUD belongs to the excluded
//! management layer.

use groundwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::infrastructure::Infrastructure;

/// Column list for `infrastructures` queries.
const COLUMNS: &str = "id, name, min_lon, min_lat, max_lon, max_lat, created_at";

/// Read access to infrastructures.
pub struct InfrastructureRepo;

impl InfrastructureRepo {
    /// Find an infrastructure by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Infrastructure>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM infrastructures WHERE id = $1");
        sqlx::query_as::<_, Infrastructure>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
