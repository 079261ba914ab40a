//! Bounded worker pool.
//!
//! A dispatcher tick claims pending jobs with `FOR UPDATE SKIP LOCKED`
//! and spawns one task per job, gated by a semaphore. A job keeps its
//! permit for its entire lifetime, poll waits included; pool sizing
//! must budget one slot per in-flight job.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use groundwatch_db::repositories::JobRepo;
use groundwatch_insar::ProcessingService;

use crate::config::WorkerConfig;
use crate::runner::run_job;

/// Claims and executes processing jobs with bounded concurrency.
pub struct WorkerPool {
    pool: PgPool,
    service: Arc<dyn ProcessingService>,
    config: WorkerConfig,
    slots: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(pool: PgPool, service: Arc<dyn ProcessingService>, config: WorkerConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            pool,
            service,
            config,
            slots,
        }
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    ///
    /// In-flight jobs observe the same token and stop at their next
    /// cancellation checkpoint.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.dispatch_interval);
        tracing::info!(
            max_concurrent = self.config.max_concurrent_jobs,
            dispatch_interval_ms = self.config.dispatch_interval.as_millis() as u64,
            "Worker pool started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker pool shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.dispatch_available(&cancel).await;
                }
            }
        }

        // Wait for in-flight jobs to reach their next checkpoint by
        // draining every permit.
        let _ = self
            .slots
            .acquire_many(self.config.max_concurrent_jobs as u32)
            .await;
        tracing::info!("Worker pool drained");
    }

    /// One dispatch cycle: claim jobs while free slots and pending work
    /// both exist.
    async fn dispatch_available(&self, cancel: &CancellationToken) {
        loop {
            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                // Every slot is busy; try again next tick.
                return;
            };

            let claimed = match JobRepo::claim_next(&self.pool).await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Job claim failed");
                    return;
                }
            };

            tracing::info!(job_id = claimed.id, "Job claimed");

            let pool = self.pool.clone();
            let service = Arc::clone(&self.service);
            let config = self.config.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_job(&pool, service.as_ref(), &config, claimed, &cancel).await;
                drop(permit);
            });
        }
    }
}
