use std::sync::Arc;

use channel::{ChannelError, Publisher};
use schema_registry::{RegistryError, SchemaRegistry, ValidationError, wire};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProduceError {
    #[error(transparent)]
    SchemaNotFound(#[from] RegistryError),

    #[error("event for topic {topic} does not satisfy {schema}: {source}")]
    Validation {
        topic: String,
        schema: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to publish event: {0}")]
    Channel(#[from] ChannelError),
}

/// Validates events against their topic's schema before they hit the channel
pub struct EventProducer {
    registry: Arc<SchemaRegistry>,
    publisher: Arc<dyn Publisher>,
}

impl EventProducer {
    pub fn new(registry: Arc<SchemaRegistry>, publisher: Arc<dyn Publisher>) -> Self {
        Self { registry, publisher }
    }

    /// Wire bytes of `payload` once it validates against the schema for `topic`
    pub fn validated_message(&self, topic: &str, payload: Value) -> Result<Vec<u8>, ProduceError> {
        let schema = self.registry.lookup(topic)?;
        let event = schema.validate(payload).map_err(|source| ProduceError::Validation {
            topic: topic.to_string(),
            schema: schema.name(),
            source,
        })?;

        Ok(wire::to_wire(&event)?)
    }

    pub async fn publish(&self, topic: &str, payload: Value) -> Result<(), ProduceError> {
        let message = self.validated_message(topic, payload)?;
        let size = message.len();

        self.publisher.publish(topic, message).await?;
        debug!(topic, size, "Published event");
        Ok(())
    }
}
