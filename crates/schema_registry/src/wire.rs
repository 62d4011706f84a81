//! Wire representation of events
//!
//! Events travel as UTF-8 JSON keyed by field name. Non-primitive values use
//! textual forms: timestamps are ISO-8601 UTC with a `Z` suffix and millisecond
//! precision, patterns are their source string, URLs their serialized form.

use serde::Serialize;
use serde_json::Value;

use crate::error::ValidationError;

/// Serialize a validated event into its wire bytes
pub fn to_wire<T: Serialize + ?Sized>(event: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(event)
}

/// Decode wire bytes into an unvalidated JSON document
pub fn from_wire(bytes: &[u8]) -> Result<Value, ValidationError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Serde adapter for `DateTime<Utc>` fields
///
/// Parsing accepts RFC 3339 strings with any offset as well as naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` values, which are taken as UTC. Sub-millisecond
/// digits are truncated so that an event survives a round trip unchanged.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::error::ValidationError;

    const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(WIRE_FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc).trunc_subsecs(3));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc().trunc_subsecs(3))
            .ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }
}
