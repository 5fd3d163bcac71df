use std::{num::NonZeroU64, time::Duration};

use rama::{error::OpaqueError, http::Uri, telemetry::tracing};

use super::{
    IntervalList, IntervalSchedule, Scenario, parse_interval_list, schedule::positive_duration,
};

/// Window duration used when neither a flag nor a scenario defines one.
pub const DEFAULT_WINDOW_SECS: f64 = 5.;

/// Load driver schedule configuration.
/// This models which rates are visited and for how long.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct ScheduleConfig {
    /// Comma separated request intervals to cycle through, e.g. `0.01,0.1,0.5,1`.
    #[arg(long, value_name = "SECONDS,...", value_parser = parse_interval_list)]
    pub intervals: Option<IntervalList>,

    /// Time spent at each interval before moving on to the next one.
    #[arg(long, value_name = "SECONDS")]
    pub window: Option<f64>,
}

impl ScheduleConfig {
    /// Use the scenario as base config,
    /// with all properties defined in `self` overwriting the scenario ones.
    pub fn merge_onto(self, scenario: Option<Scenario>) -> ScheduleConfig {
        let scenario_cfg = scenario
            .map(|s| {
                tracing::info!("use scenario to define base config: {s:?}");
                s.schedule_config()
            })
            .unwrap_or_else(|| {
                tracing::info!("no scenario defined, use default as base config");
                Default::default()
            });

        let overwrite_cfg = self;

        macro_rules! merge_config {
            ($scenario:ident, $overwrite:ident, {$($property:ident),+ $(,)?}) => {
                ScheduleConfig {
                    $(
                        $property: if let Some(value) = $overwrite.$property {
                            tracing::info!("property '{}': use overwrite: {value}", stringify!($property));
                            Some(value)
                        } else if let Some(value) = $scenario.$property {
                            tracing::info!("property '{}': use scenario: {value}", stringify!($property));
                            Some(value)
                        } else {
                            tracing::info!("property '{}': undefined", stringify!($property));
                            None
                        },
                    )+
                }
            };
        }

        merge_config!(
            scenario_cfg, overwrite_cfg,
            {
                intervals,
                window,
            }
        )
    }
}

/// Validated, immutable configuration of a [`LoadDriver`].
///
/// [`LoadDriver`]: crate::driver::LoadDriver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub target: Uri,
    pub schedule: IntervalSchedule,
    pub window: Duration,
    pub request_timeout: Option<Duration>,
    /// Amount of full passes over the schedule, `None` to run until cancelled.
    pub cycles: Option<NonZeroU64>,
}

impl DriverConfig {
    pub fn try_new(
        target: Uri,
        schedule: ScheduleConfig,
        request_timeout_secs: f64,
        cycles: Option<NonZeroU64>,
    ) -> Result<Self, OpaqueError> {
        validate_target(&target)?;

        let intervals = schedule.intervals.ok_or_else(|| {
            OpaqueError::from_display(
                "no interval schedule defined: use --intervals and/or --scenario",
            )
        })?;
        let schedule_intervals = IntervalSchedule::try_from_secs(intervals.as_secs())?;

        let window_secs = schedule.window.unwrap_or(DEFAULT_WINDOW_SECS);
        let window = positive_duration(window_secs).ok_or_else(|| {
            OpaqueError::from_display(format!(
                "window must be a positive amount of seconds, got: {window_secs}"
            ))
        })?;

        let request_timeout = if request_timeout_secs.is_nan() {
            return Err(OpaqueError::from_display("request timeout cannot be NaN"));
        } else if request_timeout_secs <= 0. {
            None
        } else {
            Some(positive_duration(request_timeout_secs).ok_or_else(|| {
                OpaqueError::from_display(format!(
                    "request timeout is out of range: {request_timeout_secs}"
                ))
            })?)
        };

        Ok(Self {
            target,
            schedule: schedule_intervals,
            window,
            request_timeout,
            cycles,
        })
    }
}

fn validate_target(target: &Uri) -> Result<(), OpaqueError> {
    match target.scheme_str() {
        Some("http" | "https") => (),
        Some(scheme) => {
            return Err(OpaqueError::from_display(format!(
                "target '{target}' uses unsupported scheme '{scheme}': expected http or https"
            )));
        }
        None => {
            return Err(OpaqueError::from_display(format!(
                "target '{target}' is not an absolute http(s) URL"
            )));
        }
    }

    if target.authority().is_none() {
        return Err(OpaqueError::from_display(format!(
            "target '{target}' has no host"
        )));
    }

    Ok(())
}
