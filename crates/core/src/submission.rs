//! Resolution of a caller's date selection into the canonical submission
//! spec sent to the external radar-processing service.
//!
//! The API accepts three selection modes; everything downstream of the
//! enqueue handler deals only in [`SubmissionSpec`], so the Job Worker
//! never branches on mode.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::raster::{GeoBounds, PointCoord};

/// Maximum acquisitions a single job may request.
pub const MAX_IMAGES_PER_JOB: usize = 24;

/// Caller-facing date selection, one variant per mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DateSelection {
    /// All acquisitions between two dates, inclusive.
    Range { start: NaiveDate, end: NaiveDate },
    /// The `count` acquisitions closest to a target date.
    Closest { target: NaiveDate, count: u32 },
    /// An explicit list of acquisition dates.
    Explicit { dates: Vec<NaiveDate> },
}

/// Canonical request shape for one external submission.
///
/// Serialized as the body of the service's `run` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSpec {
    /// Geographic bounding box of the monitored infrastructure (WGS84).
    pub bounds: GeoBounds,
    /// Monitoring points the service should cover.
    pub points: Vec<PointCoord>,
    /// Earliest acquisition date considered.
    pub start_date: NaiveDate,
    /// Latest acquisition date considered.
    pub end_date: NaiveDate,
    /// Upper bound on acquisitions; `None` means all in the window.
    pub image_limit: Option<u32>,
    /// Exact acquisition dates; empty unless the caller listed them.
    pub explicit_dates: Vec<NaiveDate>,
}

/// How far around a `Closest` target the service searches, in days.
const CLOSEST_SEARCH_RADIUS_DAYS: i64 = 182;

/// Resolve a date selection into the canonical submission spec.
///
/// Validates the selection (ordered range, non-empty explicit list,
/// count within bounds) and pairs it with the infrastructure's bounds
/// and points.
pub fn resolve(
    bounds: GeoBounds,
    points: Vec<PointCoord>,
    selection: &DateSelection,
) -> Result<SubmissionSpec, CoreError> {
    if points.is_empty() {
        return Err(CoreError::Validation(
            "Infrastructure has no monitoring points".to_string(),
        ));
    }
    if bounds.is_degenerate() {
        return Err(CoreError::Validation(
            "Infrastructure bounding box has zero extent".to_string(),
        ));
    }

    let (start_date, end_date, image_limit, explicit_dates) = match selection {
        DateSelection::Range { start, end } => {
            if start > end {
                return Err(CoreError::Validation(format!(
                    "Date range start {start} is after end {end}"
                )));
            }
            (*start, *end, None, Vec::new())
        }
        DateSelection::Closest { target, count } => {
            if *count < 2 {
                return Err(CoreError::Validation(
                    "Closest-date selection needs at least 2 images (one pair)".to_string(),
                ));
            }
            if *count as usize > MAX_IMAGES_PER_JOB {
                return Err(CoreError::Validation(format!(
                    "Image count {count} exceeds the per-job maximum {MAX_IMAGES_PER_JOB}"
                )));
            }
            let radius = chrono::Duration::days(CLOSEST_SEARCH_RADIUS_DAYS);
            (*target - radius, *target + radius, Some(*count), Vec::new())
        }
        DateSelection::Explicit { dates } => {
            if dates.len() < 2 {
                return Err(CoreError::Validation(
                    "Explicit selection needs at least 2 dates (one pair)".to_string(),
                ));
            }
            if dates.len() > MAX_IMAGES_PER_JOB {
                return Err(CoreError::Validation(format!(
                    "{} dates exceed the per-job maximum {MAX_IMAGES_PER_JOB}",
                    dates.len()
                )));
            }
            let mut sorted = dates.clone();
            sorted.sort();
            sorted.dedup();
            // Length checked above; dedup keeps at least one element.
            let start = sorted[0];
            let end = sorted[sorted.len() - 1];
            (start, end, None, sorted)
        }
    };

    Ok(SubmissionSpec {
        bounds,
        points,
        start_date,
        end_date,
        image_limit,
        explicit_dates,
    })
}
