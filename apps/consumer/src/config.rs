use std::time::Duration;
use std::{env, fmt, fs, path};

use channel::ChannelConfig;
use schema_registry::Topic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consume::ConsumerSettings;
use crate::storage::{StorageConfig, StorageKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    WriteFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,

    #[error("invalid value `{value}` for {name}")]
    InvalidOverride { name: &'static str, value: String },

    #[error("invalid value `{value}` for {name} in config file")]
    InvalidSetting { name: &'static str, value: String },

    #[error("channel kind `{0}` only works inside one process, use a network channel such as zmq")]
    InProcessChannel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub consumer: Consumer,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consumer {
    pub sleep_interval_seconds: f64,
    pub poll_timeout_ms: u64,
    /// Stop after this many milliseconds, run forever when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: ChannelConfig {
                topics: vec![Topic::SITE_AVAILABILITY_MONITORING.to_string()],
                ..ChannelConfig::default()
            },
            consumer: Consumer::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for Consumer {
    fn default() -> Self {
        Self { sleep_interval_seconds: 2.0, poll_timeout_ms: 1000, timeout_ms: None }
    }
}

impl Consumer {
    pub fn settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            sleep_interval: Duration::try_from_secs_f64(self.sleep_interval_seconds).unwrap_or_default(),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// $XDG_CONFIG_HOME/uptime-monitor/consumer.toml or $HOME/.config/...
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uptime-monitor/consumer.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_1 = |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
            writeln!(f, "    {}: {}", label, value)
        };

        writeln!(f, "Current Consumer Configuration State:")?;
        writeln!(f, "  Channel")?;
        write_1(f, "Kind", &self.channel.kind)?;
        write_1(f, "Endpoint", &self.channel.endpoint)?;
        write_1(f, "Topics", &self.channel.topics.join(", "))?;
        writeln!(f, "  Consumer")?;
        write_1(f, "Sleep Interval (s)", &self.consumer.sleep_interval_seconds)?;
        write_1(f, "Poll Timeout (ms)", &self.consumer.poll_timeout_ms)?;
        match self.consumer.timeout_ms {
            Some(timeout) => write_1(f, "Timeout (ms)", &timeout)?,
            None => write_1(f, "Timeout (ms)", &"none")?,
        }
        writeln!(f, "  Storage")?;
        write_1(f, "Kind", &self.storage.kind)?;
        write_1(f, "Path", &self.storage.path.display())?;

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, Error> {
    value.parse().map_err(|_| Error::InvalidOverride { name, value })
}

impl Config {
    /// Load the config at `optional_path` or the default location, writing
    /// the defaults there first if no file exists
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path = match optional_path {
            Some(path) => normalize_toml_path(path.as_ref()),
            None => default_config_path()?,
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            let config: Self = toml::from_str(&raw_string)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let seconds = self.consumer.sleep_interval_seconds;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::InvalidSetting { name: "consumer.sleep_interval_seconds", value: seconds.to_string() });
        }
        Ok(())
    }

    /// Reject channel kinds that cannot reach a separate process
    pub fn ensure_standalone_channel(&self) -> Result<(), Error> {
        if self.channel.is_in_process() {
            return Err(Error::InProcessChannel(self.channel.kind.clone()));
        }
        Ok(())
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str = toml::to_string_pretty(self)?;
        let write_failed = |source| Error::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), Error> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply `CHANNEL_KIND`, `CHANNEL_ENDPOINT`, `CONSUMER_SLEEP_INTERVAL_SECONDS`,
    /// `CONSUMER_POLL_TIMEOUT_MS`, `STORAGE_KIND` and `EVENTS_STORAGE_PATH` as
    /// resolved by `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        if let Some(kind) = lookup("CHANNEL_KIND") {
            self.channel.kind = kind;
        }
        if let Some(endpoint) = lookup("CHANNEL_ENDPOINT") {
            self.channel.endpoint = endpoint;
        }
        if let Some(value) = lookup("CONSUMER_SLEEP_INTERVAL_SECONDS") {
            let seconds: f64 = parse_override("CONSUMER_SLEEP_INTERVAL_SECONDS", value.clone())?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(Error::InvalidOverride { name: "CONSUMER_SLEEP_INTERVAL_SECONDS", value });
            }
            self.consumer.sleep_interval_seconds = seconds;
        }
        if let Some(value) = lookup("CONSUMER_POLL_TIMEOUT_MS") {
            self.consumer.poll_timeout_ms = parse_override("CONSUMER_POLL_TIMEOUT_MS", value)?;
        }
        if let Some(value) = lookup("STORAGE_KIND") {
            self.storage.kind = match value.as_str() {
                "libsql" => StorageKind::Libsql,
                "memory" => StorageKind::Memory,
                _ => return Err(Error::InvalidOverride { name: "STORAGE_KIND", value }),
            };
        }
        if let Some(path) = lookup("EVENTS_STORAGE_PATH") {
            self.storage.path = path.into();
        }
        Ok(())
    }
}
