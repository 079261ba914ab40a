//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod infrastructure_repo;
pub mod job_repo;
pub mod measurement_repo;
pub mod point_repo;
pub mod schedule_repo;

pub use infrastructure_repo::InfrastructureRepo;
pub use job_repo::JobRepo;
pub use measurement_repo::MeasurementRepo;
pub use point_repo::PointRepo;
pub use schedule_repo::ScheduleRepo;
