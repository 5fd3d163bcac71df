use super::{IntervalList, ScheduleConfig};

/// Preset interval schedules.
#[derive(Debug, Clone, Copy, clap::ValueEnum, Default)]
pub enum Scenario {
    /// Step down from a very high to a low request rate, then start over.
    #[default]
    Ramp,

    /// A single constant rate.
    /// Used as a reference point for the other scenarios.
    Steady,

    /// Alternate between long quiet and long busy periods.
    Pulse,
}

impl Scenario {
    /// Construct the concrete schedule configuration
    /// associated with this scenario.
    pub fn schedule_config(self) -> ScheduleConfig {
        match self {
            Scenario::Ramp => ScheduleConfig {
                intervals: Some(IntervalList::new([0.01, 0.1, 0.5, 1.0])),
                window: Some(5.),
            },

            Scenario::Steady => ScheduleConfig {
                intervals: Some(IntervalList::new([0.1])),
                window: Some(5.),
            },

            Scenario::Pulse => ScheduleConfig {
                intervals: Some(IntervalList::new([1.0, 0.01])),
                window: Some(10.),
            },
        }
    }
}
