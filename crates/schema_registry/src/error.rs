use thiserror::Error;

/// Errors raised by the topic to schema mapping
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Schema already registered for topic {0}")]
    SchemaAlreadyRegistered(String),

    #[error("No schemas for topic {0}")]
    SchemaNotFound(String),
}

/// A payload that does not satisfy its schema
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("payload does not match schema: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid regex pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("field `{field}` is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}
