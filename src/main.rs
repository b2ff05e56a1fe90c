use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a2a_gateway::{AgentEndpoint, GatewayConfig, GatewayServer, Transport, TransportConfig};

/// Serve the A2A API for a single agent over Connect.
#[derive(Debug, Parser)]
#[command(name = "a2a-gateway", version, about)]
struct Args {
    /// Agent address. `host:port` for gRPC agents; a full `http(s)://` URL
    /// for JSON-RPC agents.
    #[arg(long, default_value = "localhost:8080")]
    agent_url: String,

    /// The agent speaks A2A JSON-RPC instead of gRPC.
    #[arg(long)]
    jsonrpc: bool,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Directory with the web app to serve for non-API paths.
    #[arg(long)]
    app_dir: Option<PathBuf>,

    /// Allow cross-origin requests.
    #[arg(long)]
    cors: bool,

    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    #[arg(long, default_value_t = 60)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("a2a_gateway=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let transport = if args.jsonrpc {
        Transport::Dialect
    } else {
        Transport::Native
    };
    let endpoint = AgentEndpoint::new(&args.agent_url, transport)?;

    let mut config = GatewayConfig::new(endpoint);
    config.port = args.port;
    config.static_dir = args.app_dir;
    config.cors = args.cors;
    config.transport = TransportConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        ..TransportConfig::default()
    };

    tracing::info!(
        agent = %config.endpoint,
        port = config.port,
        "starting a2a-gateway"
    );
    GatewayServer::new(config).run().await?;
    Ok(())
}
