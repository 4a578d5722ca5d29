use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use neuronova_throttle::config::ThrottleServiceConfig;
use neuronova_throttle::http::HttpServer;
use neuronova_throttle::throttle::{Janitor, Throttle};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "neuronova-throttle")]
#[command(about = "Per-client request throttle for the Neuronova web service", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides the configuration file)
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Window length in milliseconds (overrides the configuration file)
    #[arg(long)]
    window_ms: Option<u64>,

    /// Requests admitted per client per window (overrides the configuration file)
    #[arg(long)]
    max_requests: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    info!("Starting Neuronova Throttle");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = ThrottleServiceConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(window_ms) = args.window_ms {
        config.throttle.window_duration_ms = window_ms;
    }
    if let Some(max_requests) = args.max_requests {
        config.throttle.max_requests_per_window = max_requests;
    }
    config.validate()?;

    info!(
        http_addr = %config.server.http_addr,
        window_ms = config.throttle.window_duration_ms,
        max_requests = config.throttle.max_requests_per_window,
        "Configuration loaded"
    );
    if config.throttle.trust_forwarded_for {
        warn!("Trusting X-Forwarded-For for client keys; only enable behind a proxy that sets it");
    }

    let throttle = Arc::new(Throttle::new(config.throttle.clone())?);
    info!("Throttle initialized");

    let janitor = config
        .throttle
        .sweep_interval()
        .map(|period| Janitor::start(Arc::clone(&throttle), period));

    let server = HttpServer::new(config.server.http_addr, throttle);
    let result = server.serve_with_shutdown(shutdown_signal()).await;

    if let Some(janitor) = janitor {
        janitor.shutdown().await;
    }
    result?;

    info!("Neuronova Throttle stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
