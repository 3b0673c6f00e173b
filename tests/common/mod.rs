//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use route_relay::{ProxyServer, RouteTable, RoutesConfig, Shutdown};

/// Serve a mock backend on an ephemeral port and return its address.
pub async fn spawn_backend(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    address
}

/// Run a proxy on an ephemeral port. Trigger the returned handle to
/// stop it.
pub async fn spawn_proxy(server: ProxyServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, stopper).await;
    });
    (address, shutdown)
}

/// Compile a route table straight from a JSON document.
pub fn table(document: serde_json::Value) -> RouteTable {
    let config: RoutesConfig = serde_json::from_value(document).unwrap();
    RouteTable::from_config(config).unwrap()
}

/// Client that ignores any ambient proxy environment variables.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
