//! Extension points around the forwarding pipeline.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use crate::routing::ProxyRoute;

/// Route selection handed to hooks before dispatch.
///
/// Hooks may swap the route or rewrite the mount-relative path; the
/// forwarder uses whatever is left here.
#[derive(Debug, Clone)]
pub struct RouteSelection {
    pub route: Arc<ProxyRoute>,
    pub relative_path: String,
}

/// Summary of one finished exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub route_id: String,
    pub status: StatusCode,

    /// Failure description when the proxy produced the answer itself
    /// instead of relaying the upstream one.
    pub error: Option<String>,

    pub elapsed: Duration,
}

/// Observers invoked around every forwarded exchange.
///
/// Implementations run inline on the request path and should stay
/// cheap. The default implementations do nothing.
pub trait ProxyHooks: Send + Sync + 'static {
    /// Runs after route matching, before dispatch.
    fn before_request(&self, _selection: &mut RouteSelection) {}

    /// Runs once the caller's response exists, headers decided, before
    /// the body finishes streaming.
    fn after_response(&self, _outcome: &ExchangeOutcome) {}
}

/// Hooks that observe nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ProxyHooks for NoopHooks {}
