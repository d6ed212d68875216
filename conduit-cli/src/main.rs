//! Conduit CLI

mod routes;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use conduit_config::{load_config, LogFormat, ServiceConfig};
use conduit_runtime::{Dispatcher, Server, SignalHandler};
use conduit_store::{BackendConfig, StoreBackend};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "Conduit service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error); overrides the config file
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "conduit.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, log_level } => {
            let config = match &config {
                Some(path) => load_config(path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => ServiceConfig::default(),
            };

            let level = log_level.as_deref().unwrap_or(&config.logging.level);
            init_tracing(level, config.logging.format)?;

            tracing::info!("Starting Conduit");
            serve(config).await
        }

        Commands::Validate { config } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", config.display());

            match load_config(&config) {
                Ok(cfg) => {
                    tracing::info!("Configuration is valid");
                    tracing::info!("  Listen: {}", cfg.server.listen);
                    tracing::info!("  Store: {}", describe_store(&cfg.store.backend));
                    tracing::info!("  Log level: {}", cfg.logging.level);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Conduit");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

async fn serve(config: ServiceConfig) -> Result<()> {
    let store = config.store.open().await.context("failed to open store")?;
    store.health_check().await.context("store health check failed")?;

    tracing::info!(
        listen = %config.server.listen,
        store = %describe_store(&config.store.backend),
        "Configuration loaded"
    );

    let dispatcher = Dispatcher::new();
    routes::register(&dispatcher, store)?;

    let server = Server::new(config.server, dispatcher);

    let shutdown_signal = server.shutdown_signal();
    tokio::spawn(async move {
        SignalHandler::new(shutdown_signal).run().await;
    });

    server.run().await?;
    Ok(())
}

fn describe_store(backend: &BackendConfig) -> String {
    match backend {
        BackendConfig::Memory => "memory".to_string(),
        BackendConfig::File { path } => format!("sqlite ({})", path.display()),
    }
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()?,
    }

    Ok(())
}
