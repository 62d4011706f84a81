use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{RegistryError, ValidationError};
use crate::models::{Event, EventModel, MonitoredEvent};
use crate::topics::Topic;

/// Validates raw payloads into typed events
pub trait Schema: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, raw: Value) -> Result<Event, ValidationError>;
}

pub type SchemaRef = Arc<dyn Schema>;

/// [`Schema`] backed by an [`EventModel`] type
pub struct ModelSchema<T>(PhantomData<fn() -> T>);

impl<T: EventModel> ModelSchema<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: EventModel> Default for ModelSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EventModel> Schema for ModelSchema<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn validate(&self, raw: Value) -> Result<Event, ValidationError> {
        let model: T = serde_json::from_value(raw)?;
        model.check()?;
        Ok(model.into())
    }
}

pub fn schema_for<T: EventModel>() -> SchemaRef {
    Arc::new(ModelSchema::<T>::new())
}

/// Built-in topics and their schemas
fn default_schemas() -> Vec<(&'static str, SchemaRef)> {
    vec![(Topic::SITE_AVAILABILITY_MONITORING, schema_for::<MonitoredEvent>())]
}

/// Mapping from topic name to the one schema its payloads must satisfy
///
/// Populated during startup, then shared read-only (usually behind an `Arc`)
/// by every producer and consumer in the process.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SchemaRef>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in topic registered
    pub fn with_default_schemas() -> Result<Self, RegistryError> {
        Self::with_schemas(default_schemas())
    }

    /// Registry holding `schemas`, failing on the first topic bound twice
    pub fn with_schemas(schemas: impl IntoIterator<Item = (&'static str, SchemaRef)>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (topic, schema) in schemas {
            registry.register(topic, schema)?;
        }
        Ok(registry)
    }

    /// Bind `schema` to `topic`. A topic can only be bound once.
    pub fn register(&mut self, topic: &str, schema: SchemaRef) -> Result<(), RegistryError> {
        use std::collections::hash_map::Entry;

        match self.schemas.entry(topic.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::SchemaAlreadyRegistered(topic.to_string())),
            Entry::Vacant(slot) => {
                debug!("Registered schema {} for topic {}", schema.name(), topic);
                slot.insert(schema);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, topic: &str) -> Result<SchemaRef, RegistryError> {
        self.schemas
            .get(topic)
            .cloned()
            .ok_or_else(|| RegistryError::SchemaNotFound(topic.to_string()))
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.schemas.iter().map(|(topic, schema)| (topic, schema.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_registry_knows_monitoring_topic() {
        let registry = SchemaRegistry::with_default_schemas().unwrap();

        let schema = registry.lookup(Topic::SITE_AVAILABILITY_MONITORING).unwrap();
        assert_eq!(schema.name(), "MonitoredEvent");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_then_lookup() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.is_empty());

        registry.register("new-test-topic", schema_for::<MonitoredEvent>()).unwrap();

        let schema = registry.lookup("new-test-topic").unwrap();
        assert_eq!(schema.name(), MonitoredEvent::NAME);
        assert_eq!(registry.topics().collect::<Vec<_>>(), vec!["new-test-topic"]);
    }

    #[test]
    fn test_register_twice_fails_and_keeps_first() {
        #[derive(Deserialize)]
        struct Other {
            #[allow(dead_code)]
            name: String,
        }

        // Stand-in model that never validates, so the bound schema is observable.
        impl From<Other> for Event {
            fn from(_: Other) -> Self {
                unreachable!("Other is never valid")
            }
        }

        impl EventModel for Other {
            const NAME: &'static str = "Other";

            fn check(&self) -> Result<(), ValidationError> {
                Err(ValidationError::OutOfRange { field: "name", reason: "always".to_string() })
            }
        }

        let mut registry = SchemaRegistry::new();
        registry.register("test-topic", schema_for::<MonitoredEvent>()).unwrap();

        let err = registry.register("test-topic", schema_for::<Other>()).unwrap_err();
        assert_eq!(err, RegistryError::SchemaAlreadyRegistered("test-topic".to_string()));
        assert_eq!(err.to_string(), "Schema already registered for topic test-topic");

        assert_eq!(registry.lookup("test-topic").unwrap().name(), "MonitoredEvent");
    }

    #[test]
    fn test_with_schemas_rejects_duplicate_topic() {
        let err = SchemaRegistry::with_schemas([
            (Topic::SITE_AVAILABILITY_MONITORING, schema_for::<MonitoredEvent>()),
            (Topic::SITE_AVAILABILITY_MONITORING, schema_for::<MonitoredEvent>()),
        ])
        .unwrap_err();

        assert_eq!(err, RegistryError::SchemaAlreadyRegistered(Topic::SITE_AVAILABILITY_MONITORING.to_string()));
    }

    #[test]
    fn test_lookup_unknown_topic_fails() {
        let registry = SchemaRegistry::with_default_schemas().unwrap();

        let err = registry.lookup("fake-topic").err().unwrap();
        assert_eq!(err, RegistryError::SchemaNotFound("fake-topic".to_string()));
        assert_eq!(err.to_string(), "No schemas for topic fake-topic");
    }

    #[test]
    fn test_validate_through_registry() {
        let registry = SchemaRegistry::with_default_schemas().unwrap();
        let schema = registry.lookup(Topic::SITE_AVAILABILITY_MONITORING).unwrap();

        assert!(schema.validate(json!({"bad_key": "bad_value"})).is_err());

        let event = schema
            .validate(json!({
                "url": "http://localhost",
                "rule_name": "fake-rule",
                "meta": {},
                "timestamp": "2020-12-13T10:00:00Z",
            }))
            .unwrap();
        assert_eq!(event.schema_name(), "MonitoredEvent");
    }
}
