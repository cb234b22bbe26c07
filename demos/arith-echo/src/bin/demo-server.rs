use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use switchboard_fabric::transport::{TcpTransportListener, UnixTransportListener};
use switchboard_fabric::Network;
use switchboard_rpc::config::DEFAULT_MAX_IN_FLIGHT;
use switchboard_rpc::{Server, ServerConfig};

#[derive(Parser)]
#[command(name = "demo-server", version, about = "Serve the Arith and Echo demo services")]
struct Cli {
    /// Socket kind to listen on: tcp or unix
    #[arg(long, default_value = "tcp")]
    network: Network,

    /// host:port for tcp, a socket path for unix
    #[arg(long, default_value = "127.0.0.1:1234")]
    address: String,

    /// Requests handled at once on a single connection
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Drop connections that stay silent for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::builder().max_in_flight(cli.max_in_flight);
    if let Some(secs) = cli.idle_timeout {
        config = config.read_timeout(Duration::from_secs(secs));
    }

    let registry = switchboard_demo::registry().context("registering demo services")?;
    for service in registry.service_names() {
        tracing::info!(service, methods = ?registry.method_names(service), "registered");
    }
    let server = Server::new(registry).with_config(config.build());

    match cli.network {
        Network::Tcp => {
            let addr = tokio::net::lookup_host(&cli.address)
                .await
                .with_context(|| format!("resolving {}", cli.address))?
                .next()
                .with_context(|| format!("no address found for {}", cli.address))?;
            let listener = TcpTransportListener::bind(addr)
                .await
                .with_context(|| format!("binding {}", addr))?;
            tracing::info!(address = %listener.local_addr()?, "listening on tcp");
            server.serve_with_shutdown(listener, shutdown_signal()).await?;
        }
        Network::Unix => {
            let listener = UnixTransportListener::bind(&cli.address)
                .await
                .with_context(|| format!("binding {}", cli.address))?;
            tracing::info!(path = %listener.path().display(), "listening on unix socket");
            server.serve_with_shutdown(listener, shutdown_signal()).await?;
        }
    }

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }
}
