//! zshipd - ship Zabbix exports to downstream sinks
//!
//! # Usage
//!
//! ```bash
//! zshipd -c /etc/zshipd.yaml
//! zshipd -v
//! ```

mod daemon;
mod sinks;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zship_config::Config;

/// Ship Zabbix exports to downstream sinks
#[derive(Parser, Debug)]
#[command(name = "zshipd", disable_version_flag = true)]
struct Cli {
    /// Path of config file
    #[arg(short = 'c', long = "config", default_value = "/etc/zshipd.yaml")]
    config: PathBuf,

    /// Show version info
    #[arg(short = 'v', long = "version")]
    version: bool,
}

pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");
const COMMIT: &str = match option_env!("ZSHIP_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};
const BUILD_DATE: &str = match option_env!("ZSHIP_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

fn print_version_info() {
    println!("zship {VERSION}");
    println!("Git commit: {COMMIT}");
    println!("Compilation time: {BUILD_DATE}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        print_version_info();
        return Ok(());
    }

    // Configuration problems are the only fatal error class; everything
    // after this point degrades and logs instead of exiting.
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    init_logging(config.tracing_level())?;
    zship_metrics::build_info(VERSION, COMMIT, BUILD_DATE);

    daemon::run(config).await
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| anyhow::anyhow!("invalid log level: {err}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
    Ok(())
}
