//! Release Gateway
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                RELEASE GATEWAY                │
//!     Client Request   │  ┌────────┐   ┌─────────┐   ┌──────────┐      │
//!     ─────────────────┼─▶│routing │──▶│  auth   │──▶│ dispatch │      │
//!                      │  │resolve │   │  gate   │   │transcode │      │
//!                      │  └────────┘   └────┬────┘   └────┬─────┘      │
//!                      │                    │             │            │
//!                      │                    ▼             ▼            │
//!                      │             identity service  release service │
//!     Client Response  │                                               │
//!     ◀────────────────┼── JSON body or error status ◀─────────────────  │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use release_gateway::auth::TokenReviewClient;
use release_gateway::backend::HttpReleaseClient;
use release_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use release_gateway::observability::{logging, metrics};
use release_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "release-gateway")]
#[command(about = "Authenticating REST gateway for the release service", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. ":44133".
    #[arg(long)]
    listen: Option<String>,

    /// Release service address, host:port.
    #[arg(long)]
    proxy_addr: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(listen) = &cli.listen {
        config.listener.bind_address = listen.clone();
    }
    if let Some(addr) = &cli.proxy_addr {
        config.backend.address = addr.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init(&config.observability);

    tracing::info!("release-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address,
        request_timeout_secs = config.timeouts.request_secs,
        public_status = config.auth.public_status,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let verifier = Arc::new(TokenReviewClient::from_config(&config.identity)?);
    let backend = Arc::new(HttpReleaseClient::new(&config.backend)?);
    let server = HttpServer::new(config.clone(), verifier, backend)?;

    let listener = TcpListener::bind(config.listener.socket_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = shutdown.listen_for_signals();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
