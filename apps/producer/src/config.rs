use std::{env, fmt, fs, path};

use channel::ChannelConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub rules: Rules,
    pub channel: ChannelConfig,
    pub http: Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub path: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    /// Seconds, used by rules that set no timeout of their own
    pub default_timeout: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Self { path: "rules.toml".into() }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self { default_timeout: 10.0 }
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

/// $XDG_CONFIG_HOME/uptime-monitor/producer.toml or $HOME/.config/...
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uptime-monitor/producer.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_1 = |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
            writeln!(f, "    {}: {}", label, value)
        };

        writeln!(f, "Current Producer Configuration State:")?;
        writeln!(f, "  Rules")?;
        write_1(f, "Path", &self.rules.path.display())?;
        writeln!(f, "  Channel")?;
        write_1(f, "Kind", &self.channel.kind)?;
        write_1(f, "Endpoint", &self.channel.endpoint)?;
        writeln!(f, "  HTTP")?;
        write_1(f, "Default Timeout (s)", &self.http.default_timeout)?;

        Ok(())
    }
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
        let timeout = self.http.default_timeout;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(Error::InvalidSetting { name: "http.default_timeout", value: timeout.to_string() });
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

    /// Apply `RULES_FILE_PATH`, `CHANNEL_KIND`, `CHANNEL_ENDPOINT` and
    /// `DEFAULT_HTTP_TIMEOUT` as resolved by `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        if let Some(path) = lookup("RULES_FILE_PATH") {
            self.rules.path = path.into();
        }
        if let Some(kind) = lookup("CHANNEL_KIND") {
            self.channel.kind = kind;
        }
        if let Some(endpoint) = lookup("CHANNEL_ENDPOINT") {
            self.channel.endpoint = endpoint;
        }
        if let Some(value) = lookup("DEFAULT_HTTP_TIMEOUT") {
            self.http.default_timeout = value
                .parse()
                .ok()
                .filter(|timeout: &f64| timeout.is_finite() && *timeout > 0.0)
                .ok_or(Error::InvalidOverride { name: "DEFAULT_HTTP_TIMEOUT", value })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/producer");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(dir.path().join("nested/producer.toml").exists());
        assert_eq!(Config::from_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producer.toml");
        fs::write(&path, "[channel]\nkind = \"memory\"\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.channel.kind, "memory");
        assert_eq!(config.channel.endpoint, ChannelConfig::default().endpoint);
        assert_eq!(config.http.default_timeout, 10.0);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RULES_FILE_PATH", "/etc/uptime/rules.toml"),
            ("CHANNEL_ENDPOINT", "tcp://0.0.0.0:6000"),
            ("DEFAULT_HTTP_TIMEOUT", "2.5"),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.rules.path, path::PathBuf::from("/etc/uptime/rules.toml"));
        assert_eq!(config.channel.kind, "zmq");
        assert_eq!(config.channel.endpoint, "tcp://0.0.0.0:6000");
        assert_eq!(config.http.default_timeout, 2.5);

        let err = config
            .apply_overrides(|name| (name == "DEFAULT_HTTP_TIMEOUT").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOverride { name: "DEFAULT_HTTP_TIMEOUT", .. }));
    }

    #[test]
    fn test_invalid_default_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("producer.toml");
        fs::write(&path, "[http]\ndefault_timeout = -1.0\n").unwrap();

        let err = Config::from_config(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::InvalidSetting { name: "http.default_timeout", .. }));
    }

    #[test]
    fn test_memory_channel_needs_one_process() {
        let mut config = Config::default();
        assert!(config.ensure_standalone_channel().is_ok());

        config.channel.kind = "memory".to_string();
        let err = config.ensure_standalone_channel().unwrap_err();
        assert!(matches!(err, Error::InProcessChannel(kind) if kind == "memory"));
    }

    #[test]
    fn test_display_lists_effective_values() {
        let shown = Config::default().to_string();
        assert!(shown.contains("Kind: zmq"));
        assert!(shown.contains("Default Timeout (s): 10"));
    }
}
