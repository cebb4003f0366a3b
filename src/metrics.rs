//! Metrics for the connectivity check
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding application installs a recorder.

/// Metric names and label values
pub mod labels {
    /// Ping attempts
    pub const PING_ATTEMPTS: &str = "dbping_ping_attempts_total";
    /// Ping outcomes, labelled by `outcome`
    pub const PING_OUTCOMES: &str = "dbping_ping_outcomes_total";
    /// Ping duration in milliseconds
    pub const PING_DURATION_MS: &str = "dbping_ping_duration_ms";
    /// Embedded server starts, labelled by `outcome`
    pub const SERVER_STARTS: &str = "dbping_server_starts_total";

    /// Outcome label key
    pub const OUTCOME: &str = "outcome";
    /// Successful outcome
    pub const OUTCOME_OK: &str = "ok";
    /// Deadline elapsed
    pub const OUTCOME_TIMEOUT: &str = "timeout";
    /// Any other failure
    pub const OUTCOME_ERROR: &str = "error";
}

/// Counter helpers
pub mod counters {
    use super::labels;

    /// A ping was started
    pub fn ping_attempted() {
        ::metrics::counter!(labels::PING_ATTEMPTS).increment(1);
    }

    /// A ping finished with the given outcome label
    pub fn ping_finished(outcome: &'static str) {
        ::metrics::counter!(labels::PING_OUTCOMES, labels::OUTCOME => outcome).increment(1);
    }

    /// The embedded server start finished with the given outcome label
    pub fn server_started(outcome: &'static str) {
        ::metrics::counter!(labels::SERVER_STARTS, labels::OUTCOME => outcome).increment(1);
    }
}

/// Histogram helpers
pub mod histograms {
    use super::labels;

    /// Record how long a ping took, whatever its outcome
    pub fn ping_duration(outcome: &'static str, millis: u64) {
        ::metrics::histogram!(labels::PING_DURATION_MS, labels::OUTCOME => outcome)
            .record(millis as f64);
    }
}

/// Outcome label for a ping result
pub fn outcome_label<T>(result: &crate::Result<T>) -> &'static str {
    match result {
        Ok(_) => labels::OUTCOME_OK,
        Err(crate::Error::Timeout(_)) => labels::OUTCOME_TIMEOUT,
        Err(_) => labels::OUTCOME_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcome_label() {
        assert_eq!(outcome_label(&Ok(())), labels::OUTCOME_OK);
        assert_eq!(
            outcome_label::<()>(&Err(crate::Error::Timeout(Duration::from_secs(1)))),
            labels::OUTCOME_TIMEOUT
        );
        assert_eq!(
            outcome_label::<()>(&Err(crate::Error::Client("x".into()))),
            labels::OUTCOME_ERROR
        );
    }

    #[test]
    fn test_helpers_without_recorder() {
        counters::ping_attempted();
        counters::ping_finished(labels::OUTCOME_OK);
        counters::server_started(labels::OUTCOME_ERROR);
        histograms::ping_duration(labels::OUTCOME_OK, 12);
    }
}
