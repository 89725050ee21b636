use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use mysql_diag::config::DEFAULT_CONFIG_PATH;
use mysql_diag::report::render_summary;
use mysql_diag::{ClusterConfig, DiagnosticAggregator};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Summary,
}

#[derive(Parser, Debug)]
#[command(name = "mysql-diag")]
#[command(about = "Diagnose the health of a Galera MySQL cluster", long_about = None)]
struct Args {
    /// Path to the cluster config file
    #[arg(short, long, env = "MYSQL_DIAG_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries the snapshot
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClusterConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    info!(
        "Loaded config for {} node(s) from {}",
        config.nodes().len(),
        args.config.display()
    );

    let aggregator = DiagnosticAggregator::new(config).context("Invalid cluster config")?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling outstanding checks");
                cancel.cancel();
            }
        })
    };

    let snapshot = aggregator.aggregate_with_cancel(cancel).await;
    ctrl_c.abort();

    match args.format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
            println!("{}", json);
        }
        OutputFormat::Summary => print!("{}", render_summary(&snapshot)),
    }

    Ok(())
}
