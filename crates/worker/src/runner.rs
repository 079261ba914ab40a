//! Single-job pipeline: submit, poll, harvest, estimate, finalize.
//!
//! Side effects are confined to the external service calls and the
//! repository writes; every side-effecting step is preceded by a
//! cancellation check so an operator cancel (or process shutdown) stops
//! the job promptly. Measurement writes are idempotent upserts, so
//! re-running a job after a crash cannot duplicate rows.

use std::future::Future;
use std::time::Instant;

use groundwatch_core::job_states::STATUS_CANCELLED;
use groundwatch_core::raster::{sample_coherence, sample_grid, PointCoord, RasterGrid, SampleConfig};
use groundwatch_core::submission::SubmissionSpec;
use groundwatch_core::types::DbId;
use groundwatch_core::velocity::{self, DisplacementSample};
use groundwatch_db::models::job::ProcessingJob;
use groundwatch_db::models::measurement::NewMeasurement;
use groundwatch_db::repositories::{JobRepo, MeasurementRepo, PointRepo, ScheduleRepo};
use groundwatch_insar::artifact::decode_grid;
use groundwatch_insar::backoff::{next_delay, with_jitter, PollConfig};
use groundwatch_insar::messages::{ArtifactRef, ExternalStatus, StatusResponse};
use groundwatch_insar::{InsarApiError, ProcessingService};
use sqlx::PgPool;

use crate::config::WorkerConfig;

/// How many times a transient submission error is retried before the
/// job is failed.
const SUBMIT_ATTEMPTS: u32 = 3;

/// Version tag written into the diagnostics JSON.
const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Why the poll loop stopped without reaching a terminal status.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The job was cancelled (or the process is shutting down).
    #[error("polling aborted")]
    Aborted,

    /// The overall wall-clock budget ran out.
    #[error("overall time budget of {budget_secs}s exhausted after {attempts} polls")]
    BudgetExhausted { budget_secs: u64, attempts: u32 },

    /// The maximum poll attempt count ran out.
    #[error("poll attempt budget of {max_attempts} exhausted")]
    AttemptsExhausted { max_attempts: u32 },

    /// A non-transient service error.
    #[error("processing service error: {0}")]
    Service(#[from] InsarApiError),
}

/// Result of a completed poll loop.
#[derive(Debug)]
pub struct PollOutcome {
    /// The terminal status response, output included when present.
    pub response: StatusResponse,
    /// Number of status calls made.
    pub attempts: u32,
}

/// Poll the service until the request reaches a terminal status.
///
/// * `should_abort` is consulted before every poll; returning `true`
///   stops the loop with [`PollError::Aborted`] before the next side
///   effect.
/// * `on_status` observes every reported status, terminal included; the
///   caller uses it to advance the job row when the service starts
///   working.
///
/// Transient service errors are absorbed and retried within the
/// attempt/time budget; non-transient errors abort immediately.
pub async fn poll_until_terminal<S, A, AF, O, OF>(
    service: &S,
    external_ref: &str,
    config: &PollConfig,
    mut should_abort: A,
    mut on_status: O,
) -> Result<PollOutcome, PollError>
where
    S: ProcessingService + ?Sized,
    A: FnMut() -> AF,
    AF: Future<Output = bool>,
    O: FnMut(ExternalStatus) -> OF,
    OF: Future<Output = ()>,
{
    let started = Instant::now();
    let mut delay = config.initial_delay;
    let mut attempts: u32 = 0;

    loop {
        if should_abort().await {
            return Err(PollError::Aborted);
        }
        if started.elapsed() >= config.overall_budget {
            return Err(PollError::BudgetExhausted {
                budget_secs: config.overall_budget.as_secs(),
                attempts,
            });
        }
        if attempts >= config.max_attempts {
            return Err(PollError::AttemptsExhausted {
                max_attempts: config.max_attempts,
            });
        }

        attempts += 1;
        match service.status(external_ref).await {
            Ok(response) => {
                on_status(response.status).await;
                if response.status.is_terminal() {
                    return Ok(PollOutcome { response, attempts });
                }
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(external_ref, error = %e, "Transient poll error, will retry");
            }
            Err(e) => return Err(PollError::Service(e)),
        }

        tokio::time::sleep(with_jitter(delay, config)).await;
        delay = next_delay(delay, config);
    }
}

/// Sample one decoded artifact at the job's monitoring points.
///
/// Invalid samples (outside the grid, nodata, implausible) are dropped;
/// the caller decides whether an entirely empty harvest fails the job.
pub fn extract_measurements(
    job_id: DbId,
    artifact: &ArtifactRef,
    displacement: &RasterGrid,
    coherence: Option<&RasterGrid>,
    points: &[PointCoord],
    config: &SampleConfig,
) -> Vec<NewMeasurement> {
    let sampled = sample_grid(displacement, points, config);
    let coherences = match coherence {
        Some(grid) => sample_coherence(grid, points),
        None => vec![None; points.len()],
    };

    sampled
        .iter()
        .zip(coherences)
        .filter(|(s, _)| s.valid)
        .map(|(s, coherence)| NewMeasurement {
            point_id: s.point_id,
            job_id,
            measured_on: artifact.acquired_on,
            displacement_mm: s.displacement_mm,
            coherence,
        })
        .collect()
}

/// Job-level harvest statistics recorded on the job row.
pub fn harvest_statistics(measurements: &[NewMeasurement], total_points: usize) -> serde_json::Value {
    let displacements: Vec<f64> = measurements.iter().map(|m| m.displacement_mm).collect();
    let coherences: Vec<f64> = measurements.iter().filter_map(|m| m.coherence).collect();

    let mean = |values: &[f64]| {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    serde_json::json!({
        "valid_measurements": measurements.len(),
        "total_points": total_points,
        "mean_displacement_mm": mean(&displacements),
        "min_displacement_mm": displacements.iter().copied().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.min(v)))
        }),
        "max_displacement_mm": displacements.iter().copied().fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        }),
        "mean_coherence": mean(&coherences),
    })
}

/// Execute one claimed job to a terminal state.
///
/// Never returns an error: every failure path marks the job Failed (or
/// leaves it Cancelled) and logs the cause. Panics are confined by the
/// pool's task boundary.
pub async fn run_job(
    pool: &PgPool,
    service: &dyn ProcessingService,
    config: &WorkerConfig,
    job: ProcessingJob,
    shutdown: &tokio_util::sync::CancellationToken,
) {
    let job_id = job.id;
    tracing::info!(job_id, infrastructure_id = job.infrastructure_id, "Job started");

    match run_job_inner(pool, service, config, job, shutdown).await {
        Ok(JobEnd::Succeeded) => tracing::info!(job_id, "Job succeeded"),
        Ok(JobEnd::Stopped) => tracing::info!(job_id, "Job stopped before completion"),
        Err(reason) => {
            tracing::warn!(job_id, reason = %reason, "Job failed");
            if let Err(e) = JobRepo::fail(pool, job_id, &reason).await {
                tracing::error!(job_id, error = %e, "Failed to record job failure");
            }
            record_schedule_outcome(pool, job_id, false).await;
        }
    }
}

/// Distinguishes a successful finish from an abort (cancel/shutdown).
enum JobEnd {
    Succeeded,
    Stopped,
}

/// The pipeline proper; `Err` carries the human-readable failure reason
/// persisted on the job row.
async fn run_job_inner(
    pool: &PgPool,
    service: &dyn ProcessingService,
    config: &WorkerConfig,
    job: ProcessingJob,
    shutdown: &tokio_util::sync::CancellationToken,
) -> Result<JobEnd, String> {
    let job_id = job.id;

    let spec: SubmissionSpec = serde_json::from_value(job.submission_spec.clone())
        .map_err(|e| format!("Corrupt submission spec: {e}"))?;

    // Step 1: submit, unless a previous run already did.
    let external_ref = match &job.external_ref {
        Some(r) => r.clone(),
        None => {
            if job_halted(pool, job_id, shutdown).await {
                return Ok(JobEnd::Stopped);
            }
            let r = submit_with_retry(service, &spec).await?;
            JobRepo::set_external_ref(pool, job_id, &r)
                .await
                .map_err(|e| format!("Failed to persist external handle: {e}"))?;
            r
        }
    };

    // Step 2: poll until the service is done. The first IN_PROGRESS
    // advances the job to Running.
    let outcome = poll_until_terminal(
        service,
        &external_ref,
        &config.poll,
        || job_halted(pool, job_id, shutdown),
        |status| async move {
            if status == ExternalStatus::InProgress {
                match JobRepo::mark_running(pool, job_id).await {
                    Ok(true) => tracing::info!(job_id, "Job running on processing service"),
                    Ok(false) => {}
                    Err(e) => tracing::error!(job_id, error = %e, "Failed to mark job running"),
                }
            }
        },
    )
    .await;

    let response = match outcome {
        Ok(outcome) => {
            tracing::debug!(job_id, attempts = outcome.attempts, "Poll loop finished");
            outcome.response
        }
        Err(PollError::Aborted) => {
            // Best effort: the service should stop working for a job
            // nobody will harvest.
            if let Err(e) = service.cancel(&external_ref).await {
                tracing::warn!(job_id, error = %e, "Could not cancel external request");
            }
            cleanup_cancelled(pool, job_id).await;
            return Ok(JobEnd::Stopped);
        }
        Err(e @ (PollError::BudgetExhausted { .. } | PollError::AttemptsExhausted { .. })) => {
            // Best effort: stop the external request before giving up.
            if let Err(cancel_err) = service.cancel(&external_ref).await {
                tracing::warn!(job_id, error = %cancel_err, "Could not cancel external request");
            }
            return Err(format!("Timed out waiting for processing service: {e}"));
        }
        Err(PollError::Service(e)) => {
            return Err(format!("Processing service rejected the job: {e}"))
        }
    };

    // Step 3: interpret the terminal status.
    match response.status {
        ExternalStatus::Completed => {}
        ExternalStatus::Cancelled => {
            let cancelled =
                JobRepo::cancel(pool, job_id, "Cancelled by the processing service").await;
            if let Err(e) = cancelled {
                tracing::error!(job_id, error = %e, "Failed to record cancellation");
            }
            cleanup_cancelled(pool, job_id).await;
            record_schedule_outcome(pool, job_id, false).await;
            return Ok(JobEnd::Stopped);
        }
        ExternalStatus::Failed | ExternalStatus::TimedOut => {
            let reason = response
                .error
                .unwrap_or_else(|| "Processing failed without detail".to_string());
            return Err(format!("Processing service reported failure: {reason}"));
        }
        // Non-terminal statuses cannot escape the poll loop.
        ExternalStatus::InQueue | ExternalStatus::InProgress => {
            return Err("Poll loop returned a non-terminal status".to_string());
        }
    }

    let output = response
        .output
        .ok_or_else(|| "Completed without a usable artifact".to_string())?;
    if output.artifacts.is_empty() {
        return Err("Completed with zero artifacts".to_string());
    }

    // Step 4: harvest each dated artifact into measurements.
    let points: Vec<PointCoord> = PointRepo::list_by_infrastructure(pool, job.infrastructure_id)
        .await
        .map_err(|e| format!("Failed to load monitoring points: {e}"))?
        .iter()
        .map(|p| p.coord())
        .collect();
    if points.is_empty() {
        return Err("Infrastructure has no monitoring points".to_string());
    }

    let mut all_measurements: Vec<NewMeasurement> = Vec::new();
    for artifact in &output.artifacts {
        if job_halted(pool, job_id, shutdown).await {
            cleanup_cancelled(pool, job_id).await;
            return Ok(JobEnd::Stopped);
        }

        let bytes = service
            .download(&artifact.displacement_url)
            .await
            .map_err(|e| format!("Artifact download failed: {e}"))?;
        let displacement = decode_grid(&bytes).map_err(|e| format!("Malformed artifact: {e}"))?;

        // Coherence is best-effort: a missing or unreadable coherence
        // grid degrades weights to 1.0 rather than failing the job.
        let coherence = match &artifact.coherence_url {
            Some(url) => match service.download(url).await {
                Ok(bytes) => match decode_grid(&bytes) {
                    Ok(grid) => Some(grid),
                    Err(e) => {
                        tracing::warn!(job_id, error = %e, "Ignoring malformed coherence grid");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Ignoring failed coherence download");
                    None
                }
            },
            None => None,
        };

        let measurements = extract_measurements(
            job_id,
            artifact,
            &displacement,
            coherence.as_ref(),
            &points,
            &config.sample,
        );
        tracing::info!(
            job_id,
            acquired_on = %artifact.acquired_on,
            valid = measurements.len(),
            total = points.len(),
            "Artifact sampled",
        );
        all_measurements.extend(measurements);
    }

    if all_measurements.is_empty() {
        return Err("No monitoring point produced a valid sample".to_string());
    }

    // Step 5: persist. Upserts are idempotent, so a crash between here
    // and the final status write is recoverable by re-running the job.
    for m in &all_measurements {
        if job_halted(pool, job_id, shutdown).await {
            cleanup_cancelled(pool, job_id).await;
            return Ok(JobEnd::Stopped);
        }
        MeasurementRepo::upsert(pool, m)
            .await
            .map_err(|e| format!("Measurement write failed: {e}"))?;
    }

    // Step 6: recompute velocity for every affected point. Concurrent
    // jobs touching the same point race on this metadata; each write is
    // computed from the full series at its own invocation time and the
    // last writer wins, which is an accepted relaxation.
    let mut affected: Vec<DbId> = all_measurements.iter().map(|m| m.point_id).collect();
    affected.sort_unstable();
    affected.dedup();
    for point_id in &affected {
        if let Err(e) = recompute_point_velocity(pool, *point_id).await {
            tracing::error!(job_id, point_id, error = %e, "Velocity recompute failed");
        }
    }

    // Step 7: finalize.
    let statistics = harvest_statistics(&all_measurements, points.len());
    let succeeded = JobRepo::succeed(pool, job_id, &statistics)
        .await
        .map_err(|e| format!("Failed to record success: {e}"))?;
    if !succeeded {
        // The job went terminal underneath us (operator cancel raced
        // the finish line); leave its state alone.
        return Ok(JobEnd::Stopped);
    }
    record_schedule_outcome(pool, job_id, true).await;
    Ok(JobEnd::Succeeded)
}

/// Re-estimate one point's velocity from its full measurement series
/// and persist the diagnostics on its latest measurement.
///
/// Returns `true` when an estimate was written, `false` when the point
/// has too little history.
pub async fn recompute_point_velocity(pool: &PgPool, point_id: DbId) -> Result<bool, sqlx::Error> {
    let series = MeasurementRepo::series_for_point(pool, point_id).await?;
    let samples: Vec<DisplacementSample> = series
        .iter()
        .map(|row| DisplacementSample {
            measured_on: row.measured_on,
            displacement_mm: row.displacement_mm,
            weight: row.coherence,
        })
        .collect();

    let Some(estimate) = velocity::estimate(&samples) else {
        return Ok(false);
    };

    let Some(latest) = MeasurementRepo::latest_for_point(pool, point_id).await? else {
        return Ok(false);
    };

    let mut diagnostics = serde_json::to_value(&estimate).unwrap_or_default();
    if let Some(map) = diagnostics.as_object_mut() {
        map.insert(
            "schema_version".to_string(),
            serde_json::json!(DIAGNOSTICS_SCHEMA_VERSION),
        );
    }

    MeasurementRepo::set_diagnostics(pool, latest.id, estimate.velocity_mm_yr, &diagnostics)
        .await?;
    Ok(true)
}

// ---- private helpers ----

/// Submission with a short transient-error retry.
async fn submit_with_retry(
    service: &dyn ProcessingService,
    spec: &SubmissionSpec,
) -> Result<String, String> {
    let mut last_error = String::new();
    for attempt in 1..=SUBMIT_ATTEMPTS {
        match service.submit(spec).await {
            Ok(external_ref) => return Ok(external_ref),
            Err(e) if e.is_transient() && attempt < SUBMIT_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "Transient submission error, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(attempt as u64)).await;
                last_error = e.to_string();
            }
            Err(e) => return Err(format!("Submission failed: {e}")),
        }
    }
    Err(format!("Submission failed: {last_error}"))
}

/// True when the job must stop: process shutdown or operator cancel.
async fn job_halted(
    pool: &PgPool,
    job_id: DbId,
    shutdown: &tokio_util::sync::CancellationToken,
) -> bool {
    if shutdown.is_cancelled() {
        return true;
    }
    match JobRepo::status(pool, job_id).await {
        Ok(Some(status)) => status == STATUS_CANCELLED,
        Ok(None) => true,
        Err(e) => {
            tracing::error!(job_id, error = %e, "Cancellation check failed");
            false
        }
    }
}

/// Cancellation cascade: a cancelled job leaves no measurements behind.
async fn cleanup_cancelled(pool: &PgPool, job_id: DbId) {
    match JobRepo::status(pool, job_id).await {
        Ok(Some(STATUS_CANCELLED)) => {
            match MeasurementRepo::delete_for_job(pool, job_id).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(job_id, deleted = n, "Removed cancelled job's measurements"),
                Err(e) => tracing::error!(job_id, error = %e, "Measurement cleanup failed"),
            }
        }
        _ => {}
    }
}

/// Bump the owning schedule's outcome counters, when there is one.
async fn record_schedule_outcome(pool: &PgPool, job_id: DbId, success: bool) {
    let schedule_id = match JobRepo::find_by_id(pool, job_id).await {
        Ok(Some(job)) => job.schedule_id,
        _ => None,
    };
    if let Some(schedule_id) = schedule_id {
        if let Err(e) = ScheduleRepo::record_outcome(pool, schedule_id, success).await {
            tracing::error!(job_id, schedule_id, error = %e, "Schedule outcome update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use groundwatch_core::raster::{GeoBounds, DEFAULT_NODATA};

    fn artifact() -> ArtifactRef {
        ArtifactRef {
            acquired_on: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
            displacement_url: "https://results.example/d.grd".to_string(),
            coherence_url: None,
        }
    }

    fn grid(values: Vec<f32>, width: usize, height: usize) -> RasterGrid {
        RasterGrid {
            width,
            height,
            bounds: GeoBounds {
                west: 0.0,
                south: 0.0,
                east: width as f64,
                north: height as f64,
            },
            nodata: DEFAULT_NODATA,
            values,
        }
    }

    fn point(id: i64, lon: f64, lat: f64) -> PointCoord {
        PointCoord {
            point_id: id,
            longitude: lon,
            latitude: lat,
        }
    }

    #[test]
    fn extraction_drops_invalid_points() {
        let displacement = grid(vec![-0.01, DEFAULT_NODATA, -0.02, -0.03], 2, 2);
        let points = [
            point(1, 0.5, 1.5),  // row 0 col 0: -0.01
            point(2, 1.5, 1.5),  // row 0 col 1: nodata
            point(3, 0.5, 0.5),  // row 1 col 0: -0.02
            point(4, 25.0, 0.5), // outside
        ];

        let out = extract_measurements(
            9,
            &artifact(),
            &displacement,
            None,
            &points,
            &SampleConfig::default(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].point_id, 1);
        assert!((out[0].displacement_mm - (-10.0)).abs() < 1e-9);
        assert_eq!(out[1].point_id, 3);
        assert!(out.iter().all(|m| m.job_id == 9));
        assert!(out
            .iter()
            .all(|m| m.measured_on == NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()));
    }

    #[test]
    fn extraction_attaches_coherence() {
        let displacement = grid(vec![-0.01], 1, 1);
        let coherence = grid(vec![0.9], 1, 1);
        let points = [point(1, 0.5, 0.5)];

        let out = extract_measurements(
            9,
            &artifact(),
            &displacement,
            Some(&coherence),
            &points,
            &SampleConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].coherence, Some(0.9f32 as f64));
    }

    #[test]
    fn statistics_summarize_the_harvest() {
        let measurements = vec![
            NewMeasurement {
                point_id: 1,
                job_id: 9,
                measured_on: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
                displacement_mm: -16.5,
                coherence: Some(0.8),
            },
            NewMeasurement {
                point_id: 2,
                job_id: 9,
                measured_on: NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
                displacement_mm: -19.6,
                coherence: Some(0.6),
            },
        ];

        let stats = harvest_statistics(&measurements, 5);
        assert_eq!(stats["valid_measurements"], 2);
        assert_eq!(stats["total_points"], 5);
        assert!((stats["mean_displacement_mm"].as_f64().unwrap() - (-18.05)).abs() < 1e-9);
        assert_eq!(stats["min_displacement_mm"].as_f64().unwrap(), -19.6);
        assert_eq!(stats["max_displacement_mm"].as_f64().unwrap(), -16.5);
        assert!((stats["mean_coherence"].as_f64().unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn statistics_of_empty_harvest_are_null() {
        let stats = harvest_statistics(&[], 5);
        assert_eq!(stats["valid_measurements"], 0);
        assert!(stats["mean_displacement_mm"].is_null());
        assert!(stats["mean_coherence"].is_null());
    }
}
