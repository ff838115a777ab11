//! Spool server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use spool_core::config::AppConfig;
use spool_server::bootstrap::build_state;
use spool_server::create_router;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Spool - a media delivery daemon
#[derive(Parser, Debug)]
#[command(name = "spoold")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SPOOL_CONFIG", default_value = "config/spool.toml")]
    config: String,
}

/// Load configuration. The file is optional; `SPOOL_` environment variables
/// override it, with `__` separating sections.
fn load_config(path: &str) -> Result<(AppConfig, bool)> {
    let has_config_file = std::path::Path::new(path).exists();
    let mut figment = Figment::new();
    if has_config_file {
        figment = figment.merge(Toml::file(path));
    }
    let config = figment
        .merge(Env::prefixed("SPOOL_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    Ok((config, has_config_file))
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "debug,tower_http=debug"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, has_config_file) = load_config(&args.config)?;
    init_tracing(config.server.verbose);

    tracing::info!("Spool v{}", env!("CARGO_PKG_VERSION"));
    if has_config_file {
        tracing::info!(config_path = %args.config, "Loaded configuration from file");
    } else {
        tracing::info!(config_path = %args.config, "No config file found, using defaults and environment");
    }

    let warnings = config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = build_state(config).await?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
