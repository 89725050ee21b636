use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mysql_diag_agent::config::DEFAULT_CONFIG_PATH;
use mysql_diag_agent::{create_router, tls, AgentConfig, AppState};

#[derive(Parser, Debug)]
#[command(name = "mysql-diag-agent")]
#[command(about = "Serves disk usage of this node to mysql-diag", long_about = None)]
struct Args {
    /// Path to the agent config file
    #[arg(short, long, env = "MYSQL_DIAG_AGENT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: std::path::PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
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
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting mysql-diag-agent");

    let config = AgentConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(pid_file) = &config.pid_file {
        std::fs::write(pid_file, std::process::id().to_string())
            .with_context(|| format!("Failed to write pid file {}", pid_file.display()))?;
    }

    info!(
        "Serving persistent disk {} and ephemeral disk {}",
        config.persistent_disk_path().display(),
        config.ephemeral_disk_path().display()
    );

    let app = create_router(Arc::new(AppState::from_config(&config)));

    let addr: SocketAddr = config
        .bind()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind()))?;

    if config.tls.enabled {
        let server_config = tls::load_server_config(&config.tls.certificate, &config.tls.private_key)?;
        let rustls_config = RustlsConfig::from_config(Arc::new(server_config));

        info!("Listening on https://{}", addr);
        let server = axum_server::bind_rustls(addr, rustls_config).serve(app.into_make_service());

        tokio::select! {
            res = server => { res?; }
            _ = tokio::signal::ctrl_c() => {}
        }
    } else {
        info!("Listening on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
    }

    info!("mysql-diag-agent stopped");
    Ok(())
}
