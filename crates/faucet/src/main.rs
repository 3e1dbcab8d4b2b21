//! Faucet service binary

use anyhow::Context;
use clap::Parser;
use sepolia_common::utils::logging::init_logging;
use sepolia_faucet::api::router;
use sepolia_faucet::{FaucetConfig, FaucetMetrics, FaucetService, RpcLedgerClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Faucet service CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server address
    #[arg(long)]
    server_addr: Option<String>,

    /// RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Amount sent per request, in ether
    #[arg(long)]
    drip_amount: Option<String>,

    /// Cooldown between grants to one client, in hours
    #[arg(long)]
    request_limit_hours: Option<f64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = FaucetConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }

    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = Some(rpc_url);
    }

    if let Some(amount) = args.drip_amount {
        config.drip_amount = amount;
    }

    if let Some(hours) = args.request_limit_hours {
        config.request_limit_hours = hours;
    }

    if args.debug {
        config.logging.level = "debug".to_string();
    }

    let _log_guard = init_logging(&config.logging)?;

    info!("Starting Sepolia Faucet v{}", env!("CARGO_PKG_VERSION"));

    config.validate().context("Invalid faucet configuration")?;

    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  Network: {}", config.network_name);
    info!("  Drip amount: {} ETH", config.drip_amount);
    info!("  Cooldown: {}h per client", config.request_limit_hours);

    let ledger = RpcLedgerClient::new(config.rpc_endpoint()?, &config.private_key, config.gas_limit)?;
    let metrics = Arc::new(FaucetMetrics::new().context("Failed to register metrics")?);
    let service = Arc::new(FaucetService::new(&config, Arc::new(ledger), metrics)?);
    info!("Faucet service initialized");

    let mut app = router(service.clone());

    // Add CORS if enabled
    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors);
        info!("CORS enabled");
    }

    // Expired grants behave like absent ones; this only bounds memory
    let pruner = service.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let removed = pruner.prune_expired();
            if removed > 0 {
                info!("Pruned {} expired grant records", removed);
            }
        }
    });

    // Start server
    let addr: SocketAddr = config
        .server_addr
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_addr))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
