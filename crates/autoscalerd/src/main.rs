//! autoscalerd — the autoscaler service broker daemon.
//!
//! # Usage
//!
//! ```text
//! autoscalerd serve --config /etc/autoscaler/broker.toml --port 8080
//! autoscalerd check --config /etc/autoscaler/broker.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "autoscalerd", about = "Autoscaler service broker daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the broker API.
    Serve {
        /// Path to the broker TOML configuration.
        #[arg(long)]
        config: PathBuf,

        /// Port to listen on; overrides `server.port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate the configuration and catalog, then exit.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,autoscalerd=debug,autoscaler=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve { config, port } => serve(&config, port).await,
        Command::Check { config } => {
            autoscalerd::load(&config)?;
            info!("configuration ok");
            Ok(())
        }
    }
}

async fn serve(config_path: &Path, port: Option<u16>) -> anyhow::Result<()> {
    info!("autoscaler broker starting");

    let (config, catalog) = autoscalerd::load(config_path)?;
    let state = autoscalerd::open_state(&config.data_dir)?;
    let broker = autoscalerd::build_broker(&config, catalog, state)?;

    let router = autoscaler_api::build_router(Arc::new(broker));
    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.server.port)));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("autoscaler broker stopped");
    Ok(())
}
