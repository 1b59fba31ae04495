mod collectors;
mod config;
mod flatten;
mod models;
mod report;
mod util;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "blkreport",
    about = "one-shot JSON report of block devices, filesystems, I/O stats and device-mapper state",
    version = "0.1"
)]
struct Cli {
    /// Print compact single-line JSON instead of pretty-printing
    #[arg(long)]
    compact: bool,

    /// Per-query timeout in seconds (overrides config)
    #[arg(short = 'T', long)]
    timeout: Option<u64>,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::Config::load();

    if cli.config {
        return run_print_config(&cfg);
    }

    let timeout =
        Duration::from_secs(cli.timeout.unwrap_or(cfg.general.query_timeout_sec).max(1));

    let report = report::build(
        &collectors::lsblk::Lsblk { timeout },
        &collectors::iostat::Iostat { timeout },
        &collectors::devicemapper::Dmsetup { timeout },
        |path| collectors::blockdev::device_size_bytes(path, timeout),
        &cfg.devices,
    )?;

    let text = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{text}");
    Ok(())
}

fn run_print_config(cfg: &config::Config) -> Result<()> {
    let path = config::Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  query_timeout_sec = {}", cfg.general.query_timeout_sec);
    println!();
    println!("[devices]");
    println!("  exclude = {:?}", cfg.devices.exclude);
    Ok(())
}
