//! Route definitions, one module per resource.

pub mod jobs;
pub mod schedules;
pub mod velocities;
