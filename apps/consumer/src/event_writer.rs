use std::pin::pin;

use futures::StreamExt;
use schema_registry::{Event, MonitoredEvent, Topic};
use tracing::{debug, error, info, warn};

use crate::consume::EventConsumer;
use crate::storage::EventStorage;

/// What happened to the batches seen by [`consume_and_write_monitoring_events`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub batches_written: usize,
    pub events_written: usize,
    pub batches_skipped: usize,
    pub batches_failed: usize,
}

/// Store every monitoring batch the consumer yields
///
/// Batches for other topics and empty batches are skipped. A failed write is
/// logged and the loop moves on to the next batch.
pub async fn consume_and_write_monitoring_events(consumer: &EventConsumer, storage: &dyn EventStorage) -> WriteSummary {
    let mut summary = WriteSummary::default();
    let mut batches = pin!(consumer.run());

    while let Some((topic, events)) = batches.next().await {
        if topic != Topic::SITE_AVAILABILITY_MONITORING {
            warn!(topic = %topic, "Skipping batch for topic without a writer");
            summary.batches_skipped += 1;
            continue;
        }

        let events: Vec<MonitoredEvent> = events.into_iter().filter_map(Event::into_monitored).collect();
        if events.is_empty() {
            debug!(topic = %topic, "No valid events in batch");
            summary.batches_skipped += 1;
            continue;
        }

        let count = events.len();
        match storage.write_many(events).await {
            Ok(()) => {
                info!(topic = %topic, count, "Stored events");
                summary.batches_written += 1;
                summary.events_written += count;
            }
            Err(e) => {
                error!(topic = %topic, count, "Failed to store events: {}", e);
                summary.batches_failed += 1;
            }
        }
    }

    summary
}
