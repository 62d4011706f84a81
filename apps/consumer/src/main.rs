use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use consumer::{Config, start_consumer};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "uptime-consumer", version, about = "Validate availability events and store them")]
struct Args {
    /// Config file, defaults to $XDG_CONFIG_HOME/uptime-monitor/consumer.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init("uptime-consumer");

    let args = Args::parse();
    let mut config = Config::from_config(args.config.as_deref())?;
    config.apply_env_overrides()?;

    if args.print_config {
        println!("{config}");
        return Ok(());
    }
    config.ensure_standalone_channel()?;

    tokio::select! {
        result = start_consumer(&config) => result.map(|_| ()),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}
