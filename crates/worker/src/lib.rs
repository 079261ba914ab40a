//! Job worker: drives processing jobs from Pending to a terminal state.
//!
//! A bounded pool claims pending jobs from the queue, submits each to
//! the external radar-processing service, polls until terminal,
//! harvests the raster artifacts into per-point measurements, and
//! recomputes velocity estimates for the affected points. The schedule
//! engine lives here too because it shares the same retry/idempotence
//! contracts.

pub mod config;
pub mod pool;
pub mod runner;
pub mod scheduler;
