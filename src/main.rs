//! Route-driven HTTP forwarding proxy.
//!
//! Loads a JSON route configuration, compiles it into a route table
//! and relays matching requests to their configured targets until a
//! shutdown signal arrives.

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

use route_relay::observability::{logging, metrics};
use route_relay::{ConfigurationLoader, ProxyServer, RouteTable, Shutdown};

#[derive(Parser)]
#[command(name = "route-relay")]
#[command(about = "Configuration-driven HTTP forwarding proxy", long_about = None)]
struct Args {
    /// Path to the JSON route configuration.
    #[arg(short, long, default_value = "conf/routes.json")]
    configuration: String,

    /// Servlet-style mapping the proxy is mounted on.
    #[arg(short, long, default_value = "/*")]
    mapping: String,

    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Expose Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Reject inbound bodies larger than this many bytes.
    #[arg(long)]
    max_body_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    logging::init(&format!(
        "route_relay={},tower_http=info",
        args.log_level
    ));

    if let Some(address) = args.metrics_address {
        metrics::init_metrics(address)?;
    }

    let loader = ConfigurationLoader::new(&args.configuration);
    let table = match loader.load()? {
        Some(config) => RouteTable::from_config(config)?,
        None => {
            tracing::warn!(
                configuration = %args.configuration,
                "no routes configured, proxy disabled"
            );
            RouteTable::empty()
        }
    };

    tracing::info!(
        routes = table.len(),
        mapping = %args.mapping,
        "route table ready"
    );

    let listener = TcpListener::bind(&args.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let mut server = ProxyServer::new(table).with_mapping(&args.mapping);
    if let Some(limit) = args.max_body_bytes {
        server = server.with_body_limit(limit);
    }
    server.run(listener, Shutdown::new()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
