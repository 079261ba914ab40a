//! Schedule engine: re-enqueues jobs for infrastructures with an
//! active recurring schedule.
//!
//! Runs on a fixed interval. Firing is atomic in the repository (due
//! rows are advanced and returned in one statement), so overlapping
//! engine instances cannot double-fire. Outcome counters are updated by
//! the job runner when a schedule-owned job goes terminal.

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use groundwatch_core::submission::{resolve, DateSelection};
use groundwatch_db::models::schedule::JobSchedule;
use groundwatch_db::repositories::{InfrastructureRepo, JobRepo, PointRepo, ScheduleRepo};

use crate::config::WorkerConfig;

/// Extra days added to a scheduled run's acquisition window so the
/// window always contains a reference acquisition from before the
/// period of interest.
const WINDOW_MARGIN_DAYS: i64 = 12;

/// Run the schedule engine loop until `cancel` is triggered.
pub async fn run(pool: PgPool, config: WorkerConfig, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(config.schedule_interval);
    tracing::info!(
        interval_secs = config.schedule_interval.as_secs(),
        "Schedule engine started",
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Schedule engine stopping");
                break;
            }
            _ = interval.tick() => {
                tick(&pool).await;
            }
        }
    }
}

/// One engine cycle: fire every due schedule and enqueue its job.
async fn tick(pool: &PgPool) {
    let fired = match ScheduleRepo::fire_due(pool).await {
        Ok(fired) => fired,
        Err(e) => {
            tracing::error!(error = %e, "Due-schedule query failed");
            return;
        }
    };

    for schedule in fired {
        if let Err(reason) = enqueue_for_schedule(pool, &schedule).await {
            tracing::warn!(
                schedule_id = schedule.id,
                infrastructure_id = schedule.infrastructure_id,
                reason = %reason,
                "Scheduled run could not be enqueued",
            );
            // The run counted as fired; record the failure so the
            // counters stay truthful.
            if let Err(e) = ScheduleRepo::record_outcome(pool, schedule.id, false).await {
                tracing::error!(schedule_id = schedule.id, error = %e, "Outcome update failed");
            }
        }
    }
}

/// Build and enqueue one job for a fired schedule.
async fn enqueue_for_schedule(pool: &PgPool, schedule: &JobSchedule) -> Result<(), String> {
    let infrastructure = InfrastructureRepo::find_by_id(pool, schedule.infrastructure_id)
        .await
        .map_err(|e| format!("Infrastructure lookup failed: {e}"))?
        .ok_or_else(|| "Infrastructure no longer exists".to_string())?;

    let points = PointRepo::list_by_infrastructure(pool, schedule.infrastructure_id)
        .await
        .map_err(|e| format!("Point lookup failed: {e}"))?
        .iter()
        .map(|p| p.coord())
        .collect();

    // A scheduled run covers the cadence period plus a margin so a
    // pre-period reference acquisition is always in the window.
    let today = Utc::now().date_naive();
    let window_days = i64::from(schedule.frequency_days) + WINDOW_MARGIN_DAYS;
    let selection = DateSelection::Range {
        start: today - chrono::Duration::days(window_days),
        end: today,
    };

    let spec = resolve(infrastructure.bounds(), points, &selection)
        .map_err(|e| format!("Submission spec rejected: {e}"))?;
    let spec_json =
        serde_json::to_value(&spec).map_err(|e| format!("Spec serialization failed: {e}"))?;

    let job = JobRepo::enqueue(
        pool,
        schedule.infrastructure_id,
        Some(schedule.id),
        schedule.requested_by,
        &spec_json,
    )
    .await
    .map_err(|e| format!("Enqueue failed: {e}"))?;

    tracing::info!(
        schedule_id = schedule.id,
        job_id = job.id,
        infrastructure_id = schedule.infrastructure_id,
        "Scheduled job enqueued",
    );
    Ok(())
}
