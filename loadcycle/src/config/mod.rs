mod driver;
mod mock;
mod scenario;
mod schedule;

pub use self::{
    driver::{DriverConfig, ScheduleConfig},
    mock::{MockBehavior, MockConfig},
    scenario::Scenario,
    schedule::{IntervalList, IntervalSchedule, parse_interval_list},
};
