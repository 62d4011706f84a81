pub mod monitoring_event;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use monitoring_event::{MonitoredEvent, RuleMeta};

use crate::error::ValidationError;

/// A payload that passed validation against its topic's schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Event {
    Monitored(MonitoredEvent),
}

impl Event {
    /// Name of the schema this event was validated against
    pub fn schema_name(&self) -> &'static str {
        match self {
            Event::Monitored(_) => MonitoredEvent::NAME,
        }
    }

    pub fn into_monitored(self) -> Option<MonitoredEvent> {
        match self {
            Event::Monitored(event) => Some(event),
        }
    }
}

impl From<MonitoredEvent> for Event {
    fn from(event: MonitoredEvent) -> Self {
        Event::Monitored(event)
    }
}

/// Structural type that a topic's payloads are parsed into
///
/// Field presence and types are enforced by deserialization; `check` adds
/// rules that span fields or constrain values.
pub trait EventModel: DeserializeOwned + Into<Event> + Send + Sync + 'static {
    const NAME: &'static str;

    fn check(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
