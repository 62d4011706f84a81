//! Uptime producer
//!
//! Loads monitoring rules, probes each rule's URL on its own interval and
//! publishes one schema-validated event per probe to the message channel.

pub mod config;
pub mod monitoring;
pub mod produce;
pub mod rules;

use std::sync::Arc;

use anyhow::{Context, Result};
use channel::ChannelFactory;
use schema_registry::SchemaRegistry;
use tracing::info;

pub use config::Config;
pub use monitoring::{Checker, HttpChecker, MonitoringExecutor, MonitoringResult, MonitoringScheduler};
pub use produce::{EventProducer, ProduceError};
pub use rules::{IntervalSchedule, MonitoringRule, RulesLoader, Schedule, TomlRulesLoader};

/// Load the rules named by `config`
pub fn load_rules(config: &Config) -> Result<Vec<MonitoringRule>> {
    TomlRulesLoader::new(&config.rules.path)
        .get_monitoring_rules(config.http.default_timeout)
        .with_context(|| format!("loading rules from {}", config.rules.path.display()))
}

/// Probe `rules` and publish their events until the process is stopped
pub async fn start_producer(config: &Config, rules: Vec<MonitoringRule>) -> Result<()> {
    let registry = Arc::new(SchemaRegistry::with_default_schemas().context("registering schemas")?);
    let publisher = ChannelFactory::new()
        .publisher(&config.channel)
        .with_context(|| format!("opening {}", config.channel))?;
    let checker = Arc::new(HttpChecker::new().context("building HTTP client")?);

    start_producer_with(registry, publisher, checker, rules).await
}

/// [`start_producer`] with the collaborators already built
pub async fn start_producer_with(
    registry: Arc<SchemaRegistry>,
    publisher: Arc<dyn channel::Publisher>,
    checker: Arc<dyn Checker>,
    rules: Vec<MonitoringRule>,
) -> Result<()> {
    let producer = Arc::new(EventProducer::new(registry, publisher));
    let executor = Arc::new(MonitoringExecutor::new(checker, producer));

    info!("Starting producer with {} rules", rules.len());
    MonitoringScheduler::new(executor).run(rules).await?;
    Ok(())
}
