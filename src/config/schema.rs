//! Configuration schema definitions.
//!
//! This module defines the route configuration document for the proxy.
//! All types derive Serde traits for deserialization from JSON, with
//! camelCase keys on the wire.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection establishment timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Socket read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// End-to-end execution timeout for a forwarded exchange in milliseconds.
pub const DEFAULT_EXECUTION_TIMEOUT_MS: u64 = 60_000;

/// Grace period granted to in-flight requests on shutdown in milliseconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Root configuration document.
///
/// An optional `defaultRoute` acts as a template: each declared route
/// inherits any setting it does not set itself. When `routes` is absent
/// the default route becomes the only route; when `routes` is present
/// but empty the proxy is enabled with no routes at all.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoutesConfig {
    /// Template route merged into every declared route.
    pub default_route: Option<RouteConfig>,

    /// Declared routes, evaluated in order.
    pub routes: Option<Vec<RouteConfig>>,

    /// Free-form payload for integrators, never interpreted by the proxy.
    pub extensions: Option<serde_json::Value>,
}

/// A single forwarding rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteConfig {
    /// Route identifier for logging/metrics. Assigned on load when absent.
    pub id: Option<String>,

    /// Inbound matching and rewriting rules.
    pub request_configuration: Option<RequestConfig>,

    /// Target selection and response filtering rules.
    pub response_configuration: Option<ResponseConfig>,

    /// Outbound client tuning.
    pub client_configuration: Option<ClientConfig>,

    /// Free-form payload for integrators, never interpreted by the proxy.
    pub extensions: Option<serde_json::Value>,
}

/// Inbound side of a route: what it matches and what it forwards.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestConfig {
    /// HTTP method to match, case-insensitively. Absent matches any method.
    pub method: Option<String>,

    /// Mount-relative path to match, case-insensitively. Absent matches any path.
    pub prefix: Option<String>,

    /// Header names never forwarded upstream, case-insensitive.
    pub skipped_headers: Option<Vec<String>>,

    /// Cookie names never forwarded upstream, case-insensitive.
    pub skipped_cookies: Option<Vec<String>>,

    /// Headers set on the outbound request, overriding inbound values.
    pub added_headers: Option<BTreeMap<String, String>>,
}

/// Response side of a route: where it goes and what comes back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseConfig {
    /// Base URL of the upstream service. Required on every effective route.
    pub target: Option<String>,

    /// Header names never relayed back to the caller, case-insensitive.
    pub skipped_headers: Option<Vec<String>>,

    /// `Set-Cookie` names never relayed back to the caller, case-insensitive.
    pub skipped_cookies: Option<Vec<String>>,
}

/// Outbound HTTP client settings for one route.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub timeouts: Option<TimeoutConfig>,

    pub executor: Option<ExecutorConfig>,

    pub ssl_configuration: Option<SslConfig>,
}

/// Timeouts in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Connection establishment timeout.
    pub connect: Option<u64>,

    /// Socket read timeout.
    pub read: Option<u64>,

    /// Whole-exchange deadline; expiry produces a 500 for the caller.
    pub execution: Option<u64>,
}

/// Lifecycle tuning for a route's outbound machinery.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// How long shutdown waits for the route's in-flight requests, in milliseconds.
    pub shutdown_timeout: Option<u64>,
}

/// TLS settings for the outbound client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SslConfig {
    /// Disable certificate verification. Test environments only.
    pub accept_any_certificate: bool,

    /// Path to a PEM bundle of additional trusted root certificates.
    pub ca_certificates: Option<String>,
}

impl RoutesConfig {
    /// Routes declared by the document, empty when `routes` is absent.
    pub fn routes(&self) -> &[RouteConfig] {
        self.routes.as_deref().unwrap_or_default()
    }
}

impl RouteConfig {
    /// Fills every setting this route leaves unset from `template`.
    ///
    /// Merging is shallow per sub-configuration: a missing section is
    /// taken whole from the template, a present one is merged field by
    /// field with this route winning. The route keeps its own `id` and
    /// `extensions` unless it has none.
    pub fn merged_with(mut self, template: &RouteConfig) -> RouteConfig {
        self.request_configuration = merge_section(
            self.request_configuration,
            &template.request_configuration,
            RequestConfig::merged_with,
        );
        self.response_configuration = merge_section(
            self.response_configuration,
            &template.response_configuration,
            ResponseConfig::merged_with,
        );
        self.client_configuration = merge_section(
            self.client_configuration,
            &template.client_configuration,
            ClientConfig::merged_with,
        );
        if self.extensions.is_none() {
            self.extensions = template.extensions.clone();
        }
        self
    }
}

impl RequestConfig {
    fn merged_with(mut self, template: &RequestConfig) -> RequestConfig {
        self.method = self.method.or_else(|| template.method.clone());
        self.prefix = self.prefix.or_else(|| template.prefix.clone());
        self.skipped_headers = self
            .skipped_headers
            .or_else(|| template.skipped_headers.clone());
        self.skipped_cookies = self
            .skipped_cookies
            .or_else(|| template.skipped_cookies.clone());
        self.added_headers = self
            .added_headers
            .or_else(|| template.added_headers.clone());
        self
    }
}

impl ResponseConfig {
    fn merged_with(mut self, template: &ResponseConfig) -> ResponseConfig {
        self.target = self.target.or_else(|| template.target.clone());
        self.skipped_headers = self
            .skipped_headers
            .or_else(|| template.skipped_headers.clone());
        self.skipped_cookies = self
            .skipped_cookies
            .or_else(|| template.skipped_cookies.clone());
        self
    }
}

impl ClientConfig {
    fn merged_with(mut self, template: &ClientConfig) -> ClientConfig {
        self.timeouts = merge_section(self.timeouts, &template.timeouts, TimeoutConfig::merged_with);
        self.executor = merge_section(self.executor, &template.executor, ExecutorConfig::merged_with);
        self.ssl_configuration = self
            .ssl_configuration
            .or_else(|| template.ssl_configuration.clone());
        self
    }

    /// Connect timeout with the documented default applied.
    pub fn connect_timeout(&self) -> Duration {
        self.timeout_ms(|t| t.connect, DEFAULT_CONNECT_TIMEOUT_MS)
    }

    /// Read timeout with the documented default applied.
    pub fn read_timeout(&self) -> Duration {
        self.timeout_ms(|t| t.read, DEFAULT_READ_TIMEOUT_MS)
    }

    /// Execution timeout with the documented default applied.
    pub fn execution_timeout(&self) -> Duration {
        self.timeout_ms(|t| t.execution, DEFAULT_EXECUTION_TIMEOUT_MS)
    }

    /// Shutdown grace period with the documented default applied.
    pub fn shutdown_timeout(&self) -> Duration {
        let ms = self
            .executor
            .as_ref()
            .and_then(|e| e.shutdown_timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    fn timeout_ms(&self, pick: impl Fn(&TimeoutConfig) -> Option<u64>, default: u64) -> Duration {
        let ms = self
            .timeouts
            .as_ref()
            .and_then(pick)
            .unwrap_or(default);
        Duration::from_millis(ms)
    }
}

impl TimeoutConfig {
    fn merged_with(mut self, template: &TimeoutConfig) -> TimeoutConfig {
        self.connect = self.connect.or(template.connect);
        self.read = self.read.or(template.read);
        self.execution = self.execution.or(template.execution);
        self
    }
}

impl ExecutorConfig {
    fn merged_with(mut self, template: &ExecutorConfig) -> ExecutorConfig {
        self.shutdown_timeout = self.shutdown_timeout.or(template.shutdown_timeout);
        self
    }
}

fn merge_section<T: Clone>(
    own: Option<T>,
    template: &Option<T>,
    merge: impl FnOnce(T, &T) -> T,
) -> Option<T> {
    match (own, template) {
        (Some(own), Some(template)) => Some(merge(own, template)),
        (Some(own), None) => Some(own),
        (None, template) => template.clone(),
    }
}
