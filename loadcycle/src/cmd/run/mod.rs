use std::num::NonZeroU64;

use clap::Args;
use rama::{
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    http::Uri,
    telemetry::tracing,
};

use crate::{
    config::{DriverConfig, Scenario, ScheduleConfig},
    driver::LoadDriver,
};

mod client;

#[derive(Debug, Clone, Args)]
/// send GET requests to a target, cycling through a schedule of request intervals
pub struct RunCommand {
    /// absolute http(s) URL requested on every attempt
    #[arg(value_name = "URL", required = true)]
    target: Uri,

    #[clap(flatten)]
    config: Option<ScheduleConfig>,

    #[arg(long)]
    /// Preset schedule to run,
    /// manually defined parameters overwrite scenario parameters.
    scenario: Option<Scenario>,

    /// Per request timeout (<= 0.0 = no timeout)
    #[arg(long, value_name = "SECONDS", default_value_t = 2.)]
    timeout: f64,

    /// Stop after this many passes over the full schedule,
    /// runs until interrupted if not defined.
    #[arg(long, value_name = "N")]
    cycles: Option<NonZeroU64>,
}

impl RunCommand {
    /// Merge and validate all arguments,
    /// done before any request is sent.
    pub fn try_into_driver_config(self) -> Result<DriverConfig, OpaqueError> {
        let schedule = self.config.unwrap_or_default().merge_onto(self.scenario);
        DriverConfig::try_new(self.target, schedule, self.timeout, self.cycles)
            .context("invalid run configuration")
    }
}

pub async fn exec(guard: ShutdownGuard, cfg: DriverConfig) -> Result<(), OpaqueError> {
    let driver = LoadDriver::new(cfg, self::client::new_http_client());

    let report = driver.run(guard.cancelled()).await;
    tracing::debug!("load driver exited: {report:?}");

    Ok(())
}
