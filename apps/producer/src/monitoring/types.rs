use std::fmt;

use schema_registry::HttpUrl;
use serde_json::{Map, Value};

/// Outcome of one probe
///
/// A probe that never got a response is still a result: `http_status`,
/// `latency` and `regex_match` stay unset and the error is kept in `meta`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringResult {
    pub url: HttpUrl,
    pub http_status: Option<u16>,
    /// Seconds until the response headers arrived
    pub latency: Option<f64>,
    /// `None` when the rule has no regex configured
    pub regex_match: Option<bool>,
    pub meta: Option<Map<String, Value>>,
    pub error: Option<String>,
}

impl MonitoringResult {
    pub fn new(url: HttpUrl) -> Self {
        Self { url, http_status: None, latency: None, regex_match: None, meta: None, error: None }
    }

    /// Record a received response
    pub fn with_response(mut self, http_status: u16, latency: f64, regex_match: Option<bool>) -> Self {
        self.http_status = Some(http_status);
        self.latency = Some(latency);
        self.regex_match = regex_match;
        self
    }

    /// Record the error that cut the probe short
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        let error = error.to_string();
        self.meta
            .get_or_insert_with(Map::new)
            .insert("exception".to_string(), Value::String(error.clone()));
        self.error = Some(error);
        self
    }

    pub fn is_success_http_status(&self) -> bool {
        matches!(self.http_status, Some(200..400))
    }

    pub fn is_regex_ok(&self) -> bool {
        self.regex_match != Some(false)
    }

    pub fn is_success(&self) -> bool {
        self.is_success_http_status() && self.is_regex_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> MonitoringResult {
        MonitoringResult::new(HttpUrl::parse("http://localhost").unwrap())
    }

    #[test]
    fn test_status_ranges() {
        for (status, expected) in [(199, false), (200, true), (301, true), (399, true), (400, false), (503, false)] {
            let result = result().with_response(status, 0.1, None);
            assert_eq!(result.is_success_http_status(), expected, "status {status}");
        }
        assert!(!result().is_success_http_status());
    }

    #[test]
    fn test_regex_is_only_a_condition_when_configured() {
        assert!(result().with_response(200, 0.1, None).is_success());
        assert!(result().with_response(200, 0.1, Some(true)).is_success());
        assert!(!result().with_response(200, 0.1, Some(false)).is_success());
        assert!(!result().with_response(404, 0.1, Some(true)).is_success());
    }

    #[test]
    fn test_error_without_response() {
        let result = result().with_error("connection refused");

        assert_eq!(result.http_status, None);
        assert_eq!(result.latency, None);
        assert_eq!(result.regex_match, None);
        assert_eq!(result.meta.unwrap()["exception"], "connection refused");
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }
}
