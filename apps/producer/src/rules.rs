use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fmt, fs};

use schema_registry::{HttpUrl, Pattern, RuleMeta, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rule {rule} is malformed: {source}")]
    Malformed {
        rule: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("rule {rule} is invalid: {source}")]
    Invalid {
        rule: String,
        #[source]
        source: ValidationError,
    },

    #[error("rule {rule} has invalid timeout {timeout}, expected a positive number of seconds")]
    InvalidTimeout { rule: String, timeout: f64 },
}

/// Fixed recurring period. Components add up; there are no calendar semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntervalSchedule {
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl IntervalSchedule {
    pub fn every(seconds: u64) -> Self {
        Self { seconds, ..Self::default() }
    }

    /// Total period, `None` when every component is zero
    pub fn period(&self) -> Option<Duration> {
        let total = [
            (self.weeks, 7 * 24 * 3600),
            (self.days, 24 * 3600),
            (self.hours, 3600),
            (self.minutes, 60),
            (self.seconds, 1),
        ]
        .iter()
        .try_fold(0u64, |acc, &(count, unit)| acc.checked_add(count.checked_mul(unit)?))?;

        (total > 0).then(|| Duration::from_secs(total))
    }

    /// Non-zero components as a raw mapping, e.g. `{"seconds": 10}`
    pub fn to_raw(&self) -> Map<String, Value> {
        [
            ("weeks", self.weeks),
            ("days", self.days),
            ("hours", self.hours),
            ("minutes", self.minutes),
            ("seconds", self.seconds),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(unit, count)| (unit.to_string(), Value::from(count)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Schedule {
    pub interval: Option<IntervalSchedule>,
}

impl Schedule {
    pub fn interval(interval: IntervalSchedule) -> Self {
        Self { interval: Some(interval) }
    }

    pub fn to_raw(&self) -> Map<String, Value> {
        let mut raw = Map::new();
        if let Some(interval) = &self.interval {
            raw.insert("interval".to_string(), Value::Object(interval.to_raw()));
        }
        raw
    }
}

/// A rule as written in the rules file, before validation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub url: String,
    #[serde(default)]
    pub schedule: Schedule,
    pub timeout: Option<f64>,
    pub regex_pattern: Option<String>,
}

/// A validated rule the scheduler can probe
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringRule {
    pub rule_name: String,
    pub url: HttpUrl,
    pub schedule: Schedule,
    pub timeout: Duration,
    pub regex_pattern: Option<Pattern>,
}

impl MonitoringRule {
    pub fn from_spec(rule_name: &str, spec: RuleSpec, default_timeout: f64) -> Result<Self, RuleError> {
        let invalid = |source| RuleError::Invalid { rule: rule_name.to_string(), source };

        let url = HttpUrl::parse(&spec.url).map_err(invalid)?;
        let regex_pattern = spec.regex_pattern.as_deref().map(Pattern::new).transpose().map_err(invalid)?;

        let timeout_secs = spec.timeout.unwrap_or(default_timeout);
        let timeout = Duration::try_from_secs_f64(timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .ok_or_else(|| RuleError::InvalidTimeout { rule: rule_name.to_string(), timeout: timeout_secs })?;

        Ok(Self { rule_name: rule_name.to_string(), url, schedule: spec.schedule, timeout, regex_pattern })
    }

    /// Provenance carried in every event this rule produces
    pub fn meta(&self) -> RuleMeta {
        RuleMeta {
            schedule: Some(self.schedule.to_raw()),
            timeout: Some(self.timeout.as_secs_f64()),
            regex_pattern: self.regex_pattern.clone(),
        }
    }
}

impl fmt::Display for MonitoringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule_name)
    }
}

/// Source of monitoring rules
pub trait RulesLoader {
    /// Raw rules keyed by name, in source order
    fn load_data(&self) -> Result<Vec<(String, RuleSpec)>, RuleError>;

    fn get_monitoring_rules(&self, default_timeout: f64) -> Result<Vec<MonitoringRule>, RuleError> {
        self.load_data()?
            .into_iter()
            .map(|(name, spec)| MonitoringRule::from_spec(&name, spec, default_timeout))
            .collect()
    }
}

/// Reads rules from a TOML file whose top-level tables are rules
///
/// ```toml
/// [aiven-try-free]
/// url = "https://aiven.io/"
/// timeout = 10
/// regex_pattern = "Try (Now For )?Free"
/// schedule = { interval = { seconds = 10 } }
/// ```
pub struct TomlRulesLoader {
    path: PathBuf,
}

impl TomlRulesLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl RulesLoader for TomlRulesLoader {
    fn load_data(&self) -> Result<Vec<(String, RuleSpec)>, RuleError> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|source| RuleError::Read { path: self.path.clone(), source })?;
        let rules = parse_rules(&raw)?;
        debug!("Loaded {} rules from {}", rules.len(), self.path.display());
        Ok(rules)
    }
}

pub fn parse_rules(raw: &str) -> Result<Vec<(String, RuleSpec)>, RuleError> {
    let table: toml::Table = toml::from_str(raw)?;

    table
        .into_iter()
        .map(|(name, value)| match value.try_into::<RuleSpec>() {
            Ok(spec) => Ok((name, spec)),
            Err(source) => Err(RuleError::Malformed { rule: name, source }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    const RULES: &str = r#"
        [zeta-first]
        url = "https://aiven.io/"
        timeout = 5
        regex_pattern = "Try (Now For )?Free"
        schedule = { interval = { seconds = 10 } }

        [alpha-second]
        url = "http://localhost:8000/test/"

        [alpha-second.schedule.interval]
        minutes = 1
        seconds = 30
    "#;

    #[test]
    fn test_interval_period() {
        assert_eq!(IntervalSchedule::every(10).period(), Some(Duration::from_secs(10)));

        let schedule = IntervalSchedule { weeks: 1, days: 1, hours: 1, minutes: 1, seconds: 1 };
        assert_eq!(schedule.period(), Some(Duration::from_secs(604_800 + 86_400 + 3_600 + 60 + 1)));

        assert_eq!(IntervalSchedule::default().period(), None);
        assert_eq!(IntervalSchedule { weeks: u64::MAX, ..Default::default() }.period(), None);
    }

    #[test]
    fn test_schedule_to_raw_keeps_configured_components() {
        let schedule = Schedule::interval(IntervalSchedule { minutes: 1, seconds: 30, ..Default::default() });
        assert_eq!(Value::Object(schedule.to_raw()), json!({"interval": {"minutes": 1, "seconds": 30}}));

        assert!(Schedule::default().to_raw().is_empty());
    }

    #[test]
    fn test_parse_rules_keeps_file_order() {
        let rules = parse_rules(RULES).unwrap();

        let names: Vec<_> = rules.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zeta-first", "alpha-second"]);
        assert_eq!(rules[1].1.schedule.interval.unwrap().period(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_loader_builds_validated_rules() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();

        let rules = TomlRulesLoader::new(file.path()).get_monitoring_rules(10.0).unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].rule_name, "zeta-first");
        assert_eq!(rules[0].timeout, Duration::from_secs(5));
        assert!(rules[0].regex_pattern.as_ref().unwrap().is_match("Try Free"));
        assert_eq!(rules[1].timeout, Duration::from_secs(10));
        assert_eq!(rules[1].regex_pattern, None);

        let meta = rules[0].meta();
        assert_eq!(meta.timeout, Some(5.0));
        assert_eq!(Value::Object(meta.schedule.unwrap()), json!({"interval": {"seconds": 10}}));
    }

    #[test]
    fn test_invalid_rules_are_rejected_by_name() {
        let err = parse_rules("[broken]\nurl = 'http://localhost'\nbogus = 1").unwrap_err();
        assert!(matches!(err, RuleError::Malformed { rule, .. } if rule == "broken"));

        let spec = RuleSpec { url: "ftp://example.com".into(), schedule: Schedule::default(), timeout: None, regex_pattern: None };
        let err = MonitoringRule::from_spec("bad-url", spec, 10.0).unwrap_err();
        assert!(matches!(err, RuleError::Invalid { rule, .. } if rule == "bad-url"));

        let spec = RuleSpec { url: "http://localhost".into(), schedule: Schedule::default(), timeout: Some(-1.0), regex_pattern: None };
        assert!(matches!(MonitoringRule::from_spec("neg", spec, 10.0), Err(RuleError::InvalidTimeout { .. })));

        let spec = RuleSpec { url: "http://localhost".into(), schedule: Schedule::default(), timeout: None, regex_pattern: Some("(".into()) };
        assert!(matches!(MonitoringRule::from_spec("regex", spec, 10.0), Err(RuleError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = TomlRulesLoader::new("/nonexistent/rules.toml").load_data().unwrap_err();
        assert!(matches!(err, RuleError::Read { .. }));
    }
}
