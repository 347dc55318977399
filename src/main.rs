//! smart-transport forwarding proxy.
//!
//! ```text
//!     Client ──▶ axum server ──▶ SmartTransport ──┬─ HTTP/1.1 (Connection: Upgrade)
//!                                                 └─ HTTP/2 / h2c (everything else)
//!                      ◀── response + breadcrumb headers ◀──┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use smart_transport::config::{load_config, ProxyConfig};
use smart_transport::lifecycle::signals::shutdown_on_ctrl_c;
use smart_transport::observability::{logging, metrics};
use smart_transport::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "smart-transport")]
#[command(about = "Forwarding proxy with protocol-selecting upstream transport", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        breadcrumbs = config.breadcrumbs.is_some(),
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
