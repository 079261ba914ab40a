//! Typed payloads exchanged with the radar-processing service.
//!
//! The service's status vocabulary is mapped onto the platform's own
//! job states here, in one place, so the worker never matches on raw
//! strings.

use chrono::NaiveDate;
use groundwatch_core::job_states;
use serde::{Deserialize, Serialize};

/// Status vocabulary of the external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl ExternalStatus {
    /// True once the service will never change this status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Map onto the platform's job-status ID.
    pub fn as_job_status(self) -> i16 {
        match self {
            Self::InQueue => job_states::STATUS_PENDING,
            Self::InProgress => job_states::STATUS_RUNNING,
            Self::Completed => job_states::STATUS_SUCCEEDED,
            Self::Failed | Self::TimedOut => job_states::STATUS_FAILED,
            Self::Cancelled => job_states::STATUS_CANCELLED,
        }
    }
}

/// Response returned by the service's `run` endpoint after queuing a
/// processing request.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned handle for the queued request.
    pub id: String,
}

/// Response returned by the service's `status` endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: ExternalStatus,
    /// Present once the request completed successfully.
    #[serde(default)]
    pub output: Option<JobOutput>,
    /// Present once the request failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// Output block of a completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
    /// One dated artifact per processed acquisition pair.
    pub artifacts: Vec<ArtifactRef>,
    /// Service-side summary statistics, passed through untouched.
    #[serde(default)]
    pub statistics: Option<serde_json::Value>,
}

/// Reference to one dated raster product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Acquisition date the displacement is relative to the reference.
    pub acquired_on: NaiveDate,
    /// Download URL of the displacement grid.
    pub displacement_url: String,
    /// Download URL of the matching coherence grid, when produced.
    #[serde(default)]
    pub coherence_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwatch_core::job_states::{
        STATUS_CANCELLED, STATUS_FAILED, STATUS_PENDING, STATUS_RUNNING, STATUS_SUCCEEDED,
    };

    // -- status mapping -------------------------------------------------------

    #[test]
    fn queue_states_map_onto_platform_states() {
        assert_eq!(ExternalStatus::InQueue.as_job_status(), STATUS_PENDING);
        assert_eq!(ExternalStatus::InProgress.as_job_status(), STATUS_RUNNING);
        assert_eq!(ExternalStatus::Completed.as_job_status(), STATUS_SUCCEEDED);
        assert_eq!(ExternalStatus::Failed.as_job_status(), STATUS_FAILED);
        assert_eq!(ExternalStatus::TimedOut.as_job_status(), STATUS_FAILED);
        assert_eq!(ExternalStatus::Cancelled.as_job_status(), STATUS_CANCELLED);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ExternalStatus::InQueue.is_terminal());
        assert!(!ExternalStatus::InProgress.is_terminal());
        assert!(ExternalStatus::Completed.is_terminal());
        assert!(ExternalStatus::Failed.is_terminal());
        assert!(ExternalStatus::Cancelled.is_terminal());
        assert!(ExternalStatus::TimedOut.is_terminal());
    }

    // -- payload parsing ------------------------------------------------------

    #[test]
    fn parses_in_progress_status() {
        let json = r#"{"id": "req-123", "status": "IN_PROGRESS"}"#;
        let parsed: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, ExternalStatus::InProgress);
        assert!(parsed.output.is_none());
        assert!(parsed.error.is_none());
    }

    #[test]
    fn parses_completed_status_with_artifacts() {
        let json = r#"{
            "id": "req-123",
            "status": "COMPLETED",
            "output": {
                "artifacts": [
                    {
                        "acquired_on": "2024-03-14",
                        "displacement_url": "https://results.example/displacement.grd",
                        "coherence_url": "https://results.example/coherence.grd"
                    }
                ],
                "statistics": {"mean_coherence": 0.82}
            }
        }"#;
        let parsed: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, ExternalStatus::Completed);
        let output = parsed.output.unwrap();
        assert_eq!(output.artifacts.len(), 1);
        assert_eq!(
            output.artifacts[0].acquired_on,
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
        );
        assert!(output.artifacts[0].coherence_url.is_some());
    }

    #[test]
    fn parses_failed_status_with_error() {
        let json = r#"{"id": "req-123", "status": "FAILED", "error": "no coverage for AOI"}"#;
        let parsed: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, ExternalStatus::Failed);
        assert_eq!(parsed.error.as_deref(), Some("no coverage for AOI"));
    }

    #[test]
    fn unknown_status_is_a_parse_error() {
        let json = r#"{"id": "req-123", "status": "EXPLODED"}"#;
        assert!(serde_json::from_str::<StatusResponse>(json).is_err());
    }
}
