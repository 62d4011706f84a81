use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use super::types::MonitoringResult;
use crate::rules::MonitoringRule;

/// Probes a rule's target. Never fails: problems end up in the result.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, rule: &MonitoringRule) -> MonitoringResult;
}

/// HTTP GET checker with per-rule timeout and optional body regex
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, rule: &MonitoringRule) -> MonitoringResult {
        let result = MonitoringResult::new(rule.url.clone());
        let start = Instant::now();

        let response = match self.client.get(rule.url.as_str()).timeout(rule.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(rule = %rule, "HTTP request failed: {}", e);
                return result.with_error(e);
            }
        };

        let latency = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();

        let Some(pattern) = &rule.regex_pattern else {
            return result.with_response(status, latency, None);
        };

        // The body can still fail mid-read; keep the status and latency we got.
        match response.text().await {
            Ok(body) => {
                let matched = pattern.is_match(&body);
                debug!(rule = %rule, matched, "Checked response body against {}", pattern);
                result.with_response(status, latency, Some(matched))
            }
            Err(e) => {
                warn!(rule = %rule, "Failed to read response body: {}", e);
                result.with_response(status, latency, Some(false)).with_error(e)
            }
        }
    }
}
