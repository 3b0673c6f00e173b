//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile loaded route configurations into runtime routes
//! - Build each route's dedicated outbound client
//! - Look up the first matching route for a request
//! - Drain per-route in-flight work on shutdown
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; first match wins
//! - Per-route clients keep timeouts and TLS settings isolated

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use url::Url;
use uuid::Uuid;

use crate::config::loader::ConfigError;
use crate::config::schema::{ClientConfig, RouteConfig, RoutesConfig};
use crate::lifecycle::InFlight;
use crate::routing::matcher::RouteMatcher;

/// Request-side policy compiled from one route.
#[derive(Debug, Clone, Default)]
pub struct RequestPolicy {
    /// Header names dropped from the outbound request.
    pub skipped_headers: Vec<String>,

    /// Cookie names dropped from the forwarded `Cookie` header.
    pub skipped_cookies: Vec<String>,

    /// Headers set on the outbound request, overriding inbound values.
    pub added_headers: Vec<(HeaderName, HeaderValue)>,
}

/// Response-side policy compiled from one route.
#[derive(Debug, Clone, Default)]
pub struct ResponsePolicy {
    /// Header names dropped from the relayed response.
    pub skipped_headers: Vec<String>,

    /// `Set-Cookie` names dropped from the relayed response.
    pub skipped_cookies: Vec<String>,
}

/// A compiled route with its dedicated outbound client.
#[derive(Debug)]
pub struct ProxyRoute {
    pub id: String,
    pub matcher: RouteMatcher,
    pub target: Url,
    pub request: RequestPolicy,
    pub response: ResponsePolicy,
    pub client: reqwest::Client,
    pub execution_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub in_flight: InFlight,
    pub extensions: Option<serde_json::Value>,
}

/// All compiled routes, evaluated in declaration order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<ProxyRoute>>,
}

impl RouteTable {
    /// A table with no routes; every request misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles a loaded document into runtime routes.
    pub fn from_config(config: RoutesConfig) -> Result<Self, ConfigError> {
        let mut routes = Vec::with_capacity(config.routes().len());
        for route in config.routes() {
            routes.push(Arc::new(compile(route)?));
        }
        Ok(Self { routes })
    }

    /// First route accepting `method` and the mount-relative `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<Arc<ProxyRoute>> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(method.as_str(), path))
            .cloned()
    }

    pub fn routes(&self) -> &[Arc<ProxyRoute>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Stops admitting new requests, then waits for each route's
    /// in-flight work up to that route's grace period.
    pub async fn drain(&self) {
        for route in &self.routes {
            route.in_flight.close();
        }
        for route in &self.routes {
            if !route.in_flight.drain(route.shutdown_timeout).await {
                tracing::warn!(
                    route = %route.id,
                    remaining = route.in_flight.active(),
                    grace_ms = route.shutdown_timeout.as_millis() as u64,
                    "in-flight requests outlived the shutdown grace period"
                );
            }
        }
    }
}

fn compile(config: &RouteConfig) -> Result<ProxyRoute, ConfigError> {
    let id = config
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = config.request_configuration.clone().unwrap_or_default();
    let response = config.response_configuration.clone().unwrap_or_default();
    let client_config = config.client_configuration.clone().unwrap_or_default();

    let target = response
        .target
        .as_deref()
        .ok_or_else(|| ConfigError::invalid(&id, "responseConfiguration.target is required"))?;
    let target = Url::parse(target).map_err(|e| {
        ConfigError::invalid(&id, format!("target {target:?} is not a valid URL: {e}"))
    })?;

    let mut added_headers = Vec::new();
    if let Some(added) = &request.added_headers {
        for (name, value) in added {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigError::invalid(&id, format!("addedHeaders name {name:?} is not a valid header name"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ConfigError::invalid(
                    &id,
                    format!("addedHeaders value for {name:?} is not a valid header value"),
                )
            })?;
            added_headers.push((header, value));
        }
    }

    Ok(ProxyRoute {
        matcher: RouteMatcher::new(request.method.clone(), request.prefix.clone()),
        target,
        request: RequestPolicy {
            skipped_headers: request.skipped_headers.unwrap_or_default(),
            skipped_cookies: request.skipped_cookies.unwrap_or_default(),
            added_headers,
        },
        response: ResponsePolicy {
            skipped_headers: response.skipped_headers.unwrap_or_default(),
            skipped_cookies: response.skipped_cookies.unwrap_or_default(),
        },
        client: build_client(&id, &client_config)?,
        execution_timeout: client_config.execution_timeout(),
        shutdown_timeout: client_config.shutdown_timeout(),
        in_flight: InFlight::new(),
        extensions: config.extensions.clone(),
        id,
    })
}

fn build_client(id: &str, config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
    // 3xx answers are relayed to the caller, never followed here
    let mut builder = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .read_timeout(config.read_timeout())
        .redirect(reqwest::redirect::Policy::none());

    if let Some(ssl) = &config.ssl_configuration {
        if ssl.accept_any_certificate {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &ssl.ca_certificates {
            let pem = fs::read(path).map_err(|e| {
                ConfigError::invalid(id, format!("cannot read caCertificates {path:?}: {e}"))
            })?;
            let certificates = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                ConfigError::invalid(id, format!("cannot parse caCertificates {path:?}: {e}"))
            })?;
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
    }

    builder.build().map_err(|source| ConfigError::Client {
        route: id.to_string(),
        source,
    })
}
