//! Uptime consumer
//!
//! Polls the message channel, validates every message against the schema
//! registered for its topic and stores the monitoring events.

pub mod config;
pub mod consume;
pub mod event_writer;
pub mod pool;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use channel::{ChannelFactory, Subscriber};
use schema_registry::SchemaRegistry;
use tracing::info;

pub use config::Config;
pub use consume::{ConsumerSettings, EventConsumer};
pub use event_writer::{WriteSummary, consume_and_write_monitoring_events};
pub use storage::{EventStorage, LibsqlEventStorage, MemoryEventStorage, StorageError, open_storage};

/// Consume and store events until stopped or until the configured timeout
pub async fn start_consumer(config: &Config) -> Result<WriteSummary> {
    let subscriber = ChannelFactory::new()
        .subscriber(&config.channel)
        .with_context(|| format!("opening {}", config.channel))?;
    let storage = open_storage(&config.storage)
        .await
        .with_context(|| format!("opening {} storage at {}", config.storage.kind, config.storage.path.display()))?;

    start_consumer_with(config, subscriber, storage).await
}

/// [`start_consumer`] with the channel and storage already built
pub async fn start_consumer_with(
    config: &Config,
    subscriber: Arc<dyn Subscriber>,
    storage: Arc<dyn EventStorage>,
) -> Result<WriteSummary> {
    let registry = Arc::new(SchemaRegistry::with_default_schemas().context("registering schemas")?);
    let consumer = EventConsumer::new(subscriber, registry, config.consumer.settings());

    info!("Starting consumer on {}", config.channel);
    let summary = consume_and_write_monitoring_events(&consumer, storage.as_ref()).await;
    info!(?summary, "Consumer stopped");
    Ok(summary)
}
