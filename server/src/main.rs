//! Clawsec server binary: load configuration, wire the engine, serve.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use clawsec_config::load_config;
use clawsec_engine::SecurityEngine;
use clawsec_server::{ServerConfig, app};

/// Approval-store sweep cadence. Lazy expiry on read covers the gaps.
const SWEEP_INTERVAL_MS: u64 = 60_000;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn server_config_from_env() -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Ok(host) = std::env::var("CLAWSEC_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("CLAWSEC_PORT")
        && let Ok(port) = port.parse()
    {
        config.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cwd = std::env::current_dir().context("resolving working directory")?;
    let config = load_config(&cwd).context("loading configuration")?;
    init_tracing(config.global.log_level.as_filter());

    let server_config = server_config_from_env();
    let engine = Arc::new(SecurityEngine::new(config).context("building engine")?);
    engine.start_sweeper(SWEEP_INTERVAL_MS);

    let addr = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "clawsec server listening");

    let router = app(Arc::clone(&engine), server_config);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    engine.stop_sweeper();
    tracing::info!("clawsec server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install ctrl-c handler");
    }
}
