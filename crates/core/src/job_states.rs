//! Processing-job state machine.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the API/repository layer and the worker. Status IDs match the
//! `job_statuses` seed data (1-based SMALLSERIAL).

/// Pending: created, not yet submitted or claimed.
pub const STATUS_PENDING: i16 = 1;
/// Running: submitted to the external service and being polled.
pub const STATUS_RUNNING: i16 = 2;
/// Succeeded: measurements harvested and persisted.
pub const STATUS_SUCCEEDED: i16 = 3;
/// Failed: terminal error, retried only by explicit operator action.
pub const STATUS_FAILED: i16 = 4;
/// Cancelled: stopped by explicit operator action.
pub const STATUS_CANCELLED: i16 = 5;

/// Returns the set of valid target status IDs reachable from `from_status`.
///
/// Terminal states (Succeeded, Failed, Cancelled) return an empty slice:
/// the only way out is a retry, which creates a fresh Pending job row.
pub fn valid_transitions(from_status: i16) -> &'static [i16] {
    match from_status {
        // Pending -> Running, Failed, Cancelled
        STATUS_PENDING => &[STATUS_RUNNING, STATUS_FAILED, STATUS_CANCELLED],
        // Running -> Succeeded, Failed, Cancelled
        STATUS_RUNNING => &[STATUS_SUCCEEDED, STATUS_FAILED, STATUS_CANCELLED],
        // Terminal states: no transitions allowed
        STATUS_SUCCEEDED | STATUS_FAILED | STATUS_CANCELLED => &[],
        // Unknown status: no transitions allowed
        _ => &[],
    }
}

/// Check whether a transition from `from` to `to` is valid.
pub fn can_transition(from: i16, to: i16) -> bool {
    valid_transitions(from).contains(&to)
}

/// True for Succeeded, Failed, and Cancelled.
pub fn is_terminal(status: i16) -> bool {
    matches!(status, STATUS_SUCCEEDED | STATUS_FAILED | STATUS_CANCELLED)
}

/// Validate a state transition, returning an error message for invalid ones.
pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(format!(
            "Invalid transition: {} ({from}) -> {} ({to})",
            status_name(from),
            status_name(to)
        ))
    }
}

/// Human-readable name for a status ID (for error messages and logs).
pub fn status_name(id: i16) -> &'static str {
    match id {
        STATUS_PENDING => "Pending",
        STATUS_RUNNING => "Running",
        STATUS_SUCCEEDED => "Succeeded",
        STATUS_FAILED => "Failed",
        STATUS_CANCELLED => "Cancelled",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Valid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn pending_to_running() {
        assert!(can_transition(STATUS_PENDING, STATUS_RUNNING));
    }

    #[test]
    fn pending_to_failed() {
        assert!(can_transition(STATUS_PENDING, STATUS_FAILED));
    }

    #[test]
    fn pending_to_cancelled() {
        assert!(can_transition(STATUS_PENDING, STATUS_CANCELLED));
    }

    #[test]
    fn running_to_succeeded() {
        assert!(can_transition(STATUS_RUNNING, STATUS_SUCCEEDED));
    }

    #[test]
    fn running_to_failed() {
        assert!(can_transition(STATUS_RUNNING, STATUS_FAILED));
    }

    #[test]
    fn running_to_cancelled() {
        assert!(can_transition(STATUS_RUNNING, STATUS_CANCELLED));
    }

    // -----------------------------------------------------------------------
    // Terminal states have no outgoing transitions
    // -----------------------------------------------------------------------

    #[test]
    fn succeeded_has_no_transitions() {
        assert!(valid_transitions(STATUS_SUCCEEDED).is_empty());
    }

    #[test]
    fn failed_has_no_transitions() {
        assert!(valid_transitions(STATUS_FAILED).is_empty());
    }

    #[test]
    fn cancelled_has_no_transitions() {
        assert!(valid_transitions(STATUS_CANCELLED).is_empty());
    }

    // -----------------------------------------------------------------------
    // Invalid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn succeeded_to_cancelled_invalid() {
        assert!(!can_transition(STATUS_SUCCEEDED, STATUS_CANCELLED));
    }

    #[test]
    fn failed_to_cancelled_invalid() {
        assert!(!can_transition(STATUS_FAILED, STATUS_CANCELLED));
    }

    #[test]
    fn failed_to_running_invalid() {
        assert!(!can_transition(STATUS_FAILED, STATUS_RUNNING));
    }

    #[test]
    fn pending_to_succeeded_invalid() {
        assert!(!can_transition(STATUS_PENDING, STATUS_SUCCEEDED));
    }

    #[test]
    fn cancelled_to_pending_invalid() {
        assert!(!can_transition(STATUS_CANCELLED, STATUS_PENDING));
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[test]
    fn terminal_statuses() {
        assert!(!is_terminal(STATUS_PENDING));
        assert!(!is_terminal(STATUS_RUNNING));
        assert!(is_terminal(STATUS_SUCCEEDED));
        assert!(is_terminal(STATUS_FAILED));
        assert!(is_terminal(STATUS_CANCELLED));
    }

    #[test]
    fn validate_transition_err_is_descriptive() {
        let err = validate_transition(STATUS_SUCCEEDED, STATUS_RUNNING).unwrap_err();
        assert!(err.contains("Succeeded"));
        assert!(err.contains("Running"));
    }

    #[test]
    fn unknown_status_has_no_transitions() {
        assert!(valid_transitions(99).is_empty());
    }
}
