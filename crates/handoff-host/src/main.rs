//! Arrow handoff host

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use handoff_host::{run, HostConfig, Overrides, DEFAULT_CONFIG_FILE};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load an Arrow C Data Interface exporter and print the array it produces
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path [default: handoff.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exporter shared library
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Exported symbol to call [default: export_int32_data]
    #[arg(short, long)]
    symbol: Option<String>,

    /// Number of rows to print [default: 10]
    #[arg(short, long)]
    preview: Option<usize>,

    /// Log level [default: info]
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (path, explicit) = match args.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let config = HostConfig::load_or_default(&path, explicit)?.with_overrides(Overrides {
        library: args.library,
        symbol: args.symbol,
        preview_rows: args.preview,
        log_level: args.log_level,
    });

    // Initialize tracing
    let level = &config.log_level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("handoff_host={level},handoff_core={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", path.display());

    let report = run(&config).with_context(|| format!("export via `{}` failed", config.symbol))?;
    println!("{}", report.preview);
    println!("length: {}, null_count: {}", report.length, report.null_count);
    Ok(())
}
