use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use producer::{Config, load_rules, start_producer};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "uptime-producer", version, about = "Probe HTTP endpoints and publish availability events")]
struct Args {
    /// Config file, defaults to $XDG_CONFIG_HOME/uptime-monitor/producer.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rules file, overrides the config and RULES_FILE_PATH
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init("uptime-producer");

    let args = Args::parse();
    let mut config = Config::from_config(args.config.as_deref())?;
    config.apply_env_overrides()?;
    if let Some(rules) = args.rules {
        config.rules.path = rules;
    }

    if args.print_config {
        println!("{config}");
        return Ok(());
    }
    config.ensure_standalone_channel()?;

    let rules = load_rules(&config)?;

    tokio::select! {
        result = start_producer(&config, rules) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}
