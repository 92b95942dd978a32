use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jam3a_ratelimit::config::{AppConfig, LoggingConfig};
use jam3a_ratelimit::http::{HttpServer, RateLimitState};
use jam3a_ratelimit::ratelimit::{RateLimitPolicies, SystemClock};

/// Rate-limited HTTP front for the Jam3a storefront API.
#[derive(Parser, Debug)]
#[command(name = "jam3a-ratelimit", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if args.json_logs {
        config.logging.json = true;
    }

    init_tracing(&config.logging);

    info!("Starting Jam3a rate limiting service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(bind_addr = %config.server.bind_addr, "Configuration loaded");

    let limiting = &config.rate_limiting;
    let policies = RateLimitPolicies::new(limiting.limiter_config(), limiting.rule_set()?)?;
    let state = RateLimitState::new(policies, Arc::new(SystemClock))
        .trust_forwarded_for(limiting.trust_forwarded_for);

    let server = HttpServer::new(config.server.bind_addr, Arc::new(state));
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Jam3a rate limiting service stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
