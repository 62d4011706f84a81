use std::sync::Arc;

use chrono::{DateTime, Utc};
use schema_registry::{Topic, wire};
use serde_json::{Value, json};
use tracing::info;

use super::checker::Checker;
use super::types::MonitoringResult;
use crate::produce::{EventProducer, ProduceError};
use crate::rules::MonitoringRule;

/// Shape a probe result into a monitoring event payload
pub fn prepare_report(rule: &MonitoringRule, result: &MonitoringResult, timestamp: DateTime<Utc>) -> Value {
    json!({
        "url": result.url.as_str(),
        "rule_name": rule.rule_name,
        "timestamp": wire::timestamp::format(&timestamp),
        "latency": result.latency,
        "http_status": result.http_status,
        "success": result.is_success(),
        "regex_match": result.regex_match,
        "meta": rule.meta(),
    })
}

/// Probe `rule` once and publish the outcome on the monitoring topic
pub async fn run_check(
    checker: &dyn Checker,
    producer: &EventProducer,
    rule: &MonitoringRule,
) -> Result<(), ProduceError> {
    let timestamp = Utc::now();
    let result = checker.check(rule).await;

    info!(
        rule = %rule,
        url = %result.url,
        http_status = ?result.http_status,
        latency = ?result.latency,
        regex_match = ?result.regex_match,
        success = result.is_success(),
        "Check finished"
    );

    let report = prepare_report(rule, &result, timestamp);
    producer.publish(Topic::SITE_AVAILABILITY_MONITORING, report).await
}

/// Runs checks for the scheduler
pub struct MonitoringExecutor {
    checker: Arc<dyn Checker>,
    producer: Arc<EventProducer>,
}

impl MonitoringExecutor {
    pub fn new(checker: Arc<dyn Checker>, producer: Arc<EventProducer>) -> Self {
        Self { checker, producer }
    }

    pub async fn execute_check(&self, rule: &MonitoringRule) -> Result<(), ProduceError> {
        run_check(self.checker.as_ref(), &self.producer, rule).await
    }
}
