/// Monitoring engine - probes rules on their schedules
///
/// This module is responsible for:
/// - Executing HTTP checks with timeout and body regex
/// - Scheduling each rule on its own interval
/// - Turning results into monitoring events
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{Checker, HttpChecker};
pub use executor::{MonitoringExecutor, prepare_report, run_check};
pub use scheduler::{MonitoringScheduler, ScheduleError};
pub use types::MonitoringResult;
