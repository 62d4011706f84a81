//! Producer to consumer pipeline over the in-process channel
//!
//! A fake checker stands in for the network; everything else is the real
//! producer, registry, channel, consumer and event writer.
use std::sync::Arc;
use std::time::Duration;

use channel::MemoryChannel;
use chrono::{TimeZone, Utc};
use consumer::{
    Config, ConsumerSettings, EventConsumer, LibsqlEventStorage, MemoryEventStorage, WriteSummary,
    consume_and_write_monitoring_events, start_consumer_with,
};
use producer::monitoring::{prepare_report, run_check};
use producer::{Checker, EventProducer, IntervalSchedule, MonitoringResult, MonitoringRule, Schedule};
use schema_registry::{HttpUrl, MonitoredEvent, RuleMeta, SchemaRegistry, Topic};
use serde_json::json;

struct HealthyChecker;

#[async_trait::async_trait]
impl Checker for HealthyChecker {
    async fn check(&self, rule: &MonitoringRule) -> MonitoringResult {
        MonitoringResult::new(rule.url.clone()).with_response(200, 0.25, None)
    }
}

fn fake_rule() -> MonitoringRule {
    MonitoringRule {
        rule_name: "fake-rule".to_string(),
        url: HttpUrl::parse("http://localhost").unwrap(),
        schedule: Schedule::interval(IntervalSchedule::every(10)),
        timeout: Duration::from_secs(10),
        regex_pattern: None,
    }
}

fn pipeline() -> (EventProducer, EventConsumer) {
    let channel = MemoryChannel::new();
    let registry = Arc::new(SchemaRegistry::with_default_schemas().unwrap());

    let producer = EventProducer::new(registry.clone(), Arc::new(channel.clone()));
    let settings = ConsumerSettings {
        sleep_interval: Duration::from_millis(7),
        poll_timeout: Duration::from_millis(5),
        timeout: Some(Duration::from_millis(5)),
    };
    let consumer = EventConsumer::new(Arc::new(channel), registry, settings);

    (producer, consumer)
}

#[tokio::test(start_paused = true)]
async fn test_one_probe_becomes_one_stored_event() {
    let (producer, consumer) = pipeline();
    let rule = fake_rule();
    let timestamp = Utc.with_ymd_and_hms(2020, 12, 13, 10, 0, 0).unwrap();

    let result = HealthyChecker.check(&rule).await;
    producer
        .publish(Topic::SITE_AVAILABILITY_MONITORING, prepare_report(&rule, &result, timestamp))
        .await
        .unwrap();

    let storage = MemoryEventStorage::new();
    let summary = consume_and_write_monitoring_events(&consumer, &storage).await;

    let expected = MonitoredEvent {
        url: HttpUrl::parse("http://localhost").unwrap(),
        rule_name: "fake-rule".to_string(),
        timestamp,
        latency: Some(0.25),
        http_status: Some(200),
        success: Some(true),
        regex_match: None,
        meta: RuleMeta {
            schedule: json!({"interval": {"seconds": 10}}).as_object().cloned(),
            timeout: Some(10.0),
            regex_pattern: None,
        },
    };

    assert_eq!(summary, WriteSummary { batches_written: 1, events_written: 1, ..Default::default() });
    assert_eq!(storage.writes().await, vec![vec![expected]]);
}

#[tokio::test(start_paused = true)]
async fn test_run_check_reaches_storage() {
    let (producer, consumer) = pipeline();
    let rule = fake_rule();

    run_check(&HealthyChecker, &producer, &rule).await.unwrap();
    run_check(&HealthyChecker, &producer, &rule).await.unwrap();

    let storage = MemoryEventStorage::new();
    consume_and_write_monitoring_events(&consumer, &storage).await;

    let writes = storage.writes().await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), 2);
    assert!(writes[0].iter().all(|event| event.success == Some(true) && event.rule_name == "fake-rule"));
}

#[tokio::test]
async fn test_events_land_in_libsql() {
    let dir = tempfile::tempdir().unwrap();
    let channel = MemoryChannel::new();
    let registry = Arc::new(SchemaRegistry::with_default_schemas().unwrap());
    let producer = EventProducer::new(registry, Arc::new(channel.clone()));

    run_check(&HealthyChecker, &producer, &fake_rule()).await.unwrap();

    let storage = Arc::new(LibsqlEventStorage::open(dir.path().join("events.db")).await.unwrap());
    let mut config = Config::default();
    config.consumer.sleep_interval_seconds = 0.1;
    config.consumer.poll_timeout_ms = 10;
    config.consumer.timeout_ms = Some(50);

    let summary = start_consumer_with(&config, Arc::new(channel), storage.clone()).await.unwrap();

    assert_eq!(summary.events_written, 1);
    assert_eq!(storage.count_events().await.unwrap(), 1);
    let stored = storage.recent_events("fake-rule", 5).await.unwrap();
    assert_eq!(stored[0].http_status, Some(200));
    assert_eq!(stored[0].latency, Some(0.25));
}
