//! Domain-level error type shared across crates.

use crate::types::DbId;

/// Errors produced by domain logic.
///
/// The API layer maps these onto HTTP statuses; the worker logs them and
/// records a short reason string on the job row.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind, e.g. "Job" or "Schedule".
        entity: &'static str,
        /// Primary key that was looked up.
        id: DbId,
    },

    /// Input failed a domain validation rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with current state (e.g. cancelling a
    /// job that is already terminal).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Job creation throttled for the requesting user.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
