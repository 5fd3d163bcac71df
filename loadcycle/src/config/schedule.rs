use std::{fmt, time::Duration};

use rama::error::OpaqueError;

/// Interval list as given on the command line,
/// in seconds and not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalList(Vec<f64>);

impl IntervalList {
    pub fn new(secs: impl Into<Vec<f64>>) -> Self {
        Self(secs.into())
    }

    pub fn as_secs(&self) -> &[f64] {
        &self.0
    }
}

impl fmt::Display for IntervalList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, secs) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{secs}")?;
        }
        Ok(())
    }
}

/// Parse a comma separated list of seconds, e.g. `0.01,0.1,0.5,1`.
pub fn parse_interval_list(input: &str) -> Result<IntervalList, String> {
    let secs: Vec<f64> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|err| format!("invalid interval '{s}': {err}"))
        })
        .collect::<Result<_, _>>()?;

    if secs.is_empty() {
        return Err("interval list cannot be empty".to_owned());
    }

    Ok(IntervalList(secs))
}

/// Ordered, cyclic and immutable sequence of pacing intervals.
///
/// Guaranteed to be non-empty and to only contain positive durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSchedule(Vec<Duration>);

#[allow(clippy::len_without_is_empty)]
impl IntervalSchedule {
    pub fn try_from_secs(secs: &[f64]) -> Result<Self, OpaqueError> {
        if secs.is_empty() {
            return Err(OpaqueError::from_display(
                "interval schedule must contain at least one interval",
            ));
        }

        secs.iter()
            .enumerate()
            .map(|(index, &secs)| {
                positive_duration(secs).ok_or_else(|| {
                    OpaqueError::from_display(format!(
                        "interval #{index} must be a positive amount of seconds, got: {secs}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Interval at the given position, wrapping around the end.
    pub fn get(&self, index: usize) -> Duration {
        self.0[index % self.0.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.0.iter().copied()
    }
}

/// Converts seconds into a [`Duration`] when strictly positive and finite.
pub(crate) fn positive_duration(secs: f64) -> Option<Duration> {
    if secs.is_nan() || secs <= 0. {
        return None;
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}
