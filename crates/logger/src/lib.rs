//! Tracing setup shared by the producer and consumer binaries
//!
//! Verbosity follows `RUST_LOG` (default `info`). Output format follows
//! `RUST_LOG_FORMAT`: `json`, `pretty`, or anything else for compact lines.

use std::env::var;
use std::str::FromStr;

use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        })
    }
}

impl LogFormat {
    pub fn from_env() -> Self {
        var("RUST_LOG_FORMAT").ok().and_then(|raw| raw.parse().ok()).unwrap_or_default()
    }
}

/// Install the global subscriber at `info`. Repeated calls are ignored.
pub fn init(service: &str) {
    if let Err(error) = try_init(service, LevelFilter::INFO) {
        warn!("Tracing already initialized for {service}: {error}");
    }
}

pub fn try_init(service: &str, level: LevelFilter) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    let format = LogFormat::from_env();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()?;
    info!(service, ?format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = try_init("first", LevelFilter::WARN);
        assert!(try_init("second", LevelFilter::WARN).is_err());
    }
}
