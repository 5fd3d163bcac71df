use std::time::Duration;

use rama::{error::OpaqueError, http::StatusCode, telemetry::tracing};

/// Observed result of a single request attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Response received with a 2xx or 3xx status.
    Ok(StatusCode),
    /// Response received with any other status.
    HttpStatus(StatusCode),
    /// No response: connect, dns, tls or protocol failure.
    Failed(OpaqueError),
    /// No response within the request timeout.
    TimedOut(Duration),
}

impl AttemptOutcome {
    pub fn from_status(status: StatusCode) -> Self {
        if (200..400).contains(&status.as_u16()) {
            Self::Ok(status)
        } else {
            Self::HttpStatus(status)
        }
    }

    pub(super) fn log(&self, attempt: u64, latency: Duration) {
        match self {
            Self::Ok(status) => tracing::info!(
                attempt,
                http.response.status_code = status.as_u16(),
                ?latency,
                "sent request. response: {status}",
            ),
            Self::HttpStatus(status) => tracing::warn!(
                attempt,
                http.response.status_code = status.as_u16(),
                ?latency,
                "sent request. unexpected response: {status}",
            ),
            Self::Failed(err) => tracing::warn!(
                attempt,
                ?latency,
                "failed to send request: {err}",
            ),
            Self::TimedOut(timeout) => tracing::warn!(
                attempt,
                "failed to send request: timed out after {}",
                humantime::format_duration(*timeout),
            ),
        }
    }
}

/// Totals of a [`LoadDriver`] run, logged when it stops.
///
/// [`LoadDriver`]: super::LoadDriver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Windows that ran until their end, an interrupted window is not counted.
    pub windows: u64,
    pub attempts: u64,
    pub ok: u64,
    pub http_fail: u64,
    pub other_fail: u64,
}

impl DriverReport {
    pub(super) fn record(&mut self, outcome: &AttemptOutcome) {
        self.attempts += 1;
        match outcome {
            AttemptOutcome::Ok(_) => self.ok += 1,
            AttemptOutcome::HttpStatus(_) => self.http_fail += 1,
            AttemptOutcome::Failed(_) | AttemptOutcome::TimedOut(_) => self.other_fail += 1,
        }
    }
}
