use std::time::Duration;

use crate::config::IntervalSchedule;

/// Position within an [`IntervalSchedule`].
///
/// Starts at the first interval and only ever moves forward,
/// wrapping around after the last interval.
#[derive(Debug, Clone)]
pub struct ScheduleCursor {
    schedule: IntervalSchedule,
    position: usize,
}

impl ScheduleCursor {
    pub fn new(schedule: IntervalSchedule) -> Self {
        Self {
            schedule,
            position: 0,
        }
    }

    /// Index of the interval returned by the next [`Self::advance`] call.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn schedule(&self) -> &IntervalSchedule {
        &self.schedule
    }

    /// Select the interval at the cursor and move the cursor to the next one.
    pub fn advance(&mut self) -> Duration {
        let interval = self.schedule.get(self.position);
        self.position = (self.position + 1) % self.schedule.len();
        interval
    }
}
