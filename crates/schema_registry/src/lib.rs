//! Schema registry for uptime monitoring events
//!
//! Every event that crosses the message channel is validated against the
//! schema registered for its topic. This crate holds:
//! - the topic to schema [`SchemaRegistry`]
//! - the event model ([`MonitoredEvent`], [`RuleMeta`])
//! - the wire codec used by producers and consumers

pub mod error;
pub mod models;
pub mod registry;
pub mod topics;
pub mod types;
pub mod wire;

pub use error::{RegistryError, ValidationError};
pub use models::{Event, EventModel, MonitoredEvent, RuleMeta};
pub use registry::{ModelSchema, Schema, SchemaRef, SchemaRegistry, schema_for};
pub use topics::Topic;
pub use types::{HttpUrl, Pattern};
