use std::time::Duration;

use rama::error::OpaqueError;

/// Mock target server behavior.
/// This models processing cost and instability of the server under load.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct MockConfig {
    /// Base processing time before responding.
    #[arg(long, value_name = "SECONDS")]
    pub latency: Option<f64>,

    /// Random delay within `[-jitter, +jitter]` added to the latency.
    #[arg(long, value_name = "SECONDS")]
    pub jitter: Option<f64>,

    /// Probability of returning an error response.
    #[arg(long)]
    pub error_rate: Option<f64>,
}

/// [`MockConfig`] with defaults applied and ranges checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockBehavior {
    pub latency: Duration,
    pub jitter: Duration,
    pub error_rate: f64,
}

impl MockConfig {
    pub fn try_into_behavior(self) -> Result<MockBehavior, OpaqueError> {
        let latency = non_negative_duration("latency", self.latency.unwrap_or_default())?;
        let jitter = non_negative_duration("jitter", self.jitter.unwrap_or_default())?;

        let error_rate = self.error_rate.unwrap_or_default();
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(OpaqueError::from_display(format!(
                "error rate must be within [0, 1], got: {error_rate}"
            )));
        }

        Ok(MockBehavior {
            latency,
            jitter,
            error_rate,
        })
    }
}

fn non_negative_duration(name: &str, secs: f64) -> Result<Duration, OpaqueError> {
    Duration::try_from_secs_f64(secs).map_err(|err| {
        OpaqueError::from_display(format!(
            "{name} must be a non-negative amount of seconds, got {secs}: {err}"
        ))
    })
}
