use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EventModel;
use crate::error::ValidationError;
use crate::types::{HttpUrl, Pattern};

/// Provenance of the rule that produced an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    /// Raw schedule mapping as configured, e.g. `{"interval": {"seconds": 10}}`
    pub schedule: Option<Map<String, Value>>,
    pub timeout: Option<f64>,
    pub regex_pattern: Option<Pattern>,
}

/// One availability observation for a monitored URL
///
/// This is the on-wire and on-disk contract of the
/// [`SITE_AVAILABILITY_MONITORING`](crate::Topic::SITE_AVAILABILITY_MONITORING) topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredEvent {
    pub url: HttpUrl,
    pub rule_name: String,
    #[serde(with = "crate::wire::timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Seconds spent waiting for the response
    pub latency: Option<f64>,
    pub http_status: Option<u16>,
    pub success: Option<bool>,
    /// `None` when the rule has no regex configured
    pub regex_match: Option<bool>,
    pub meta: RuleMeta,
}

impl EventModel for MonitoredEvent {
    const NAME: &'static str = "MonitoredEvent";

    fn check(&self) -> Result<(), ValidationError> {
        if let Some(latency) = self.latency {
            if !latency.is_finite() || latency < 0.0 {
                return Err(ValidationError::OutOfRange {
                    field: "latency",
                    reason: format!("{latency} is not a non-negative number of seconds"),
                });
            }
        }

        if let Some(timeout) = self.meta.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(ValidationError::OutOfRange {
                    field: "meta.timeout",
                    reason: format!("{timeout} is not a positive number of seconds"),
                });
            }
        }

        Ok(())
    }
}
