use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info};

use super::executor::MonitoringExecutor;
use crate::rules::MonitoringRule;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Rule {0} has no interval schedule")]
    MissingInterval(String),

    #[error("Rule {rule} has an interval of {period:?}, too long to schedule")]
    PeriodOutOfRange { rule: String, period: Duration },
}

/// Monitoring scheduler - one timer task per rule
///
/// A rule's first check fires one full period after scheduling. Checks for the
/// same rule never overlap: the task awaits each check before waiting for the
/// next tick, and ticks missed meanwhile are skipped.
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
}

/// Instant of the first tick for a rule scheduled now
///
/// The timer adds `period` again after every tick, so twice the period must
/// still be representable.
fn first_tick(rule: &MonitoringRule, period: Duration) -> Result<Instant, ScheduleError> {
    let now = Instant::now();
    now.checked_add(period.saturating_mul(2))
        .and_then(|_| now.checked_add(period))
        .ok_or_else(|| ScheduleError::PeriodOutOfRange { rule: rule.rule_name.clone(), period })
}

impl MonitoringScheduler {
    pub fn new(executor: Arc<MonitoringExecutor>) -> Self {
        Self { executor }
    }

    /// Schedule a single rule for periodic checking
    pub fn schedule_monitor(&self, rule: MonitoringRule, period: Duration) -> Result<JoinHandle<()>, ScheduleError> {
        let start = first_tick(&rule, period)?;
        Ok(self.spawn_monitor(rule, start, period))
    }

    fn spawn_monitor(&self, rule: MonitoringRule, start: Instant, period: Duration) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let mut timer = interval_at(start, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                match AssertUnwindSafe(executor.execute_check(&rule)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(rule = %rule, "Failed to publish check result: {}", e),
                    Err(_) => error!(rule = %rule, "Check panicked, continuing on schedule"),
                }
            }
        })
    }

    /// Schedule every rule, or none if any rule lacks a usable interval
    pub fn schedule_monitors(&self, rules: Vec<MonitoringRule>) -> Result<Vec<JoinHandle<()>>, ScheduleError> {
        let scheduled = rules
            .into_iter()
            .map(|rule| match rule.schedule.interval.and_then(|interval| interval.period()) {
                Some(period) => Ok((first_tick(&rule, period)?, rule, period)),
                None => Err(ScheduleError::MissingInterval(rule.rule_name)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(scheduled
            .into_iter()
            .map(|(start, rule, period)| {
                info!(rule = %rule, url = %rule.url, ?period, "Scheduling rule");
                self.spawn_monitor(rule, start, period)
            })
            .collect())
    }

    /// Run every rule until the tasks are stopped
    pub async fn run(&self, rules: Vec<MonitoringRule>) -> Result<(), ScheduleError> {
        let handles = self.schedule_monitors(rules)?;

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                error!("Rule task stopped: {}", e);
            }
        }

        Ok(())
    }
}
