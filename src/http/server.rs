//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the relay handler
//! - Wire up middleware (tracing, request ID, body limits)
//! - Resolve the servlet-style mapping to a mount-relative path
//! - Match routes, run hooks, dispatch to the forwarder
//! - Observability (metrics, correlation IDs)

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::hooks::{ExchangeOutcome, NoopHooks, ProxyHooks, RouteSelection};
use crate::http::forwarder::{self, ForwardError};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::http::response;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::RouteTable;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    table: Arc<RouteTable>,
    mount: Arc<str>,
    hooks: Arc<dyn ProxyHooks>,
}

/// HTTP server relaying requests according to a route table.
pub struct ProxyServer {
    table: Arc<RouteTable>,
    mount: String,
    hooks: Arc<dyn ProxyHooks>,
    body_limit: Option<usize>,
}

impl ProxyServer {
    /// A server forwarding everything under `/` according to `table`.
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
            mount: String::new(),
            hooks: Arc::new(NoopHooks),
            body_limit: None,
        }
    }

    /// Serves routes under a servlet-style mapping such as `/proxy/*`.
    ///
    /// A trailing `/*` is dropped; the rest becomes the mount prefix
    /// that route prefixes are resolved against. Requests outside the
    /// mount get a 404 without touching the route table.
    pub fn with_mapping(mut self, mapping: &str) -> Self {
        self.mount = mount_prefix(mapping);
        self
    }

    /// Installs observers around every forwarded exchange.
    pub fn with_hooks(mut self, hooks: impl ProxyHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Caps inbound request bodies at `bytes`.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    /// Shared handle to the compiled routes.
    pub fn table(&self) -> Arc<RouteTable> {
        Arc::clone(&self.table)
    }

    /// Build the Axum router with all middleware layers.
    pub fn into_router(self) -> Router {
        let state = AppState {
            table: self.table,
            mount: self.mount.into(),
            hooks: self.hooks,
        };
        // layers run last-added first: ids are assigned before tracing
        let mut router = Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(RequestIdLayer);
        if let Some(limit) = self.body_limit {
            router = router.layer(RequestBodyLimitLayer::new(limit));
        }
        router
    }

    /// Run the server until `shutdown` fires or Ctrl-C arrives, then
    /// drain each route within its grace period before returning.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let address = listener.local_addr()?;
        let table = Arc::clone(&self.table);
        tracing::info!(address = %address, routes = table.len(), "proxy server starting");

        let signal = shutdown.signal();
        let mut server = tokio::spawn(
            axum::serve(listener, self.into_router().into_make_service()).into_future(),
        );

        tokio::select! {
            result = &mut server => {
                result.map_err(std::io::Error::other)??;
            }
            _ = signal => {
                tracing::info!("shutdown signal received");
                table.drain().await;
                server.abort();
                match server.await {
                    Ok(result) => result?,
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => return Err(std::io::Error::other(e)),
                }
            }
        }

        tracing::info!("proxy server stopped");
        Ok(())
    }
}

/// Main relay handler: resolves the mount, matches a route, runs the
/// hooks and hands over to the forwarder.
async fn relay_handler(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    let relative = relative_path(&state.mount, &path);
    let route = relative.and_then(|relative| state.table.find(&method, relative));
    let (Some(relative), Some(route)) = (relative, route) else {
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            "no route matched"
        );
        metrics::record_request("none", method.as_str(), StatusCode::NOT_FOUND.as_u16(), started);
        return response::plain_text(StatusCode::NOT_FOUND, "No matching route found");
    };

    let mut selection = RouteSelection {
        route,
        relative_path: relative.to_string(),
    };
    state.hooks.before_request(&mut selection);
    let RouteSelection {
        route,
        relative_path,
    } = selection;

    tracing::debug!(
        request_id = %request_id,
        route = %route.id,
        method = %method,
        path = %path,
        "relaying request"
    );

    let relayed = forwarder::forward(Arc::clone(&route), &relative_path, request).await;

    metrics::record_request(
        &route.id,
        method.as_str(),
        relayed.status().as_u16(),
        started,
    );
    let outcome = ExchangeOutcome {
        route_id: route.id.clone(),
        status: relayed.status(),
        error: relayed
            .extensions()
            .get::<ForwardError>()
            .map(|e| e.0.clone()),
        elapsed: started.elapsed(),
    };
    state.hooks.after_response(&outcome);

    relayed
}

/// Strips a servlet-style `/*` suffix from the mapping.
fn mount_prefix(mapping: &str) -> String {
    mapping.strip_suffix("/*").unwrap_or(mapping).to_string()
}

/// Path relative to the mount, or `None` when the request lives
/// outside it.
fn relative_path<'a>(mount: &str, path: &'a str) -> Option<&'a str> {
    if mount.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(mount) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => Some(rest),
        _ => None,
    }
}
