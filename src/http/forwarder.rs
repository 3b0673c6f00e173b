//! The forwarding pipeline.
//!
//! # Responsibilities
//! - Turn a matched request into an outbound call on the route's client
//! - Filter headers and cookies in both directions
//! - Stream bodies in bounded chunks without buffering
//! - Convert failures into answers for the caller
//!
//! # Design Decisions
//! - Dispatch runs under the route's execution deadline
//! - Upstream answers are relayed verbatim apart from configured filtering
//! - Failures the upstream never answered become a plain-text 500
//! - The in-flight slot is held until the relayed body is dropped

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use futures_util::{Stream, StreamExt};
use url::Url;

use crate::http::response;
use crate::lifecycle::InFlightGuard;
use crate::routing::router::{ProxyRoute, RequestPolicy};

/// Upper bound for one relayed body chunk.
pub const MAX_CHUNK_BYTES: usize = 8 * 1024;

/// Headers stripped from the outbound request beyond the hop-by-hop
/// set: the client computes authority and framing itself, and cookies
/// are rebuilt separately.
const REQUEST_ONLY_SKIPS: [&str; 4] = ["host", "content-length", "expect", "cookie"];

/// Marker stored in response extensions when the proxy answered on its
/// own because the exchange failed.
#[derive(Debug, Clone)]
pub struct ForwardError(pub String);

/// Relays `request` to the route's target and returns the answer for
/// the caller.
pub(crate) async fn forward(
    route: Arc<ProxyRoute>,
    relative_path: &str,
    request: Request,
) -> Response {
    let Some(guard) = route.in_flight.guard() else {
        tracing::warn!(route = %route.id, "request refused while the route drains");
        return response::plain_text(StatusCode::SERVICE_UNAVAILABLE, "proxy is shutting down");
    };

    let (parts, body) = request.into_parts();
    let url = outbound_url(&route.target, relative_path, parts.uri.query());
    let headers = outbound_headers(&route.request, &parts.method, &parts.headers);

    tracing::debug!(route = %route.id, method = %parts.method, url = %url, "dispatching");

    let mut outbound = route
        .client
        .request(parts.method.clone(), url)
        .headers(headers);
    if accepts_body(&parts.method) {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    match tokio::time::timeout(route.execution_timeout, outbound.send()).await {
        Ok(Ok(upstream)) => relay(&route, guard, upstream),
        Ok(Err(e)) => {
            tracing::warn!(route = %route.id, error = %e, "upstream call failed");
            failure(format!("upstream call failed: {e}"))
        }
        Err(_) => {
            tracing::warn!(
                route = %route.id,
                timeout_ms = route.execution_timeout.as_millis() as u64,
                "upstream call timed out"
            );
            failure(format!(
                "upstream did not answer within {}ms",
                route.execution_timeout.as_millis()
            ))
        }
    }
}

/// Builds the caller's response from the upstream one: status kept,
/// headers filtered, body re-chunked and streamed through.
fn relay(route: &ProxyRoute, guard: InFlightGuard, upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    for (name, value) in upstream.headers() {
        if response::is_hop_by_hop(name)
            || response::name_in(&route.response.skipped_headers, name.as_str())
        {
            continue;
        }
        if name == header::SET_COOKIE {
            let skipped = value
                .to_str()
                .is_ok_and(|v| {
                    response::name_in(&route.response.skipped_cookies, response::set_cookie_name(v))
                });
            if skipped {
                continue;
            }
        }
        headers.append(name.clone(), value.clone());
    }
    response::fix_not_modified(status, &mut headers);

    let route_id = route.id.clone();
    let body = bounded_chunks(upstream.bytes_stream()).map(move |item| {
        // the guard rides along until the relayed body is dropped
        let _streaming = &guard;
        if let Err(e) = &item {
            tracing::error!(route = %route_id, error = %e, "error relaying upstream body");
        }
        item
    });

    let mut relayed = Response::new(Body::from_stream(body));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    relayed
}

fn failure(reason: String) -> Response {
    let mut response = response::plain_text(StatusCode::INTERNAL_SERVER_ERROR, reason.clone());
    response.extensions_mut().insert(ForwardError(reason));
    response
}

/// Joins the target base path with the mount-relative path and carries
/// the raw query over.
fn outbound_url(target: &Url, relative_path: &str, query: Option<&str>) -> Url {
    let mut url = target.clone();
    if !relative_path.is_empty() {
        let path = format!("{}{}", url.path().trim_end_matches('/'), relative_path);
        url.set_path(&path);
    }
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.set_query(Some(&forwarded_query(query)));
    }
    url
}

/// Rebuilds the raw query, padding bare keys with an empty value.
/// Order and duplicates are preserved; nothing is re-encoded.
fn forwarded_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some(_) => pair.to_string(),
            None => format!("{pair}="),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Inbound headers minus hop-by-hop, carrier fields and the route's
/// denylist, with cookies rebuilt and configured headers added on top.
fn outbound_headers(policy: &RequestPolicy, method: &Method, inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if response::is_hop_by_hop(name)
            || REQUEST_ONLY_SKIPS.contains(&name.as_str())
            || response::name_in(&policy.skipped_headers, name.as_str())
        {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    let cookies = forwarded_cookies(&policy.skipped_cookies, inbound);
    if !cookies.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&cookies) {
            outbound.insert(header::COOKIE, value);
        }
    }

    for (name, value) in &policy.added_headers {
        outbound.insert(name.clone(), value.clone());
    }

    if accepts_body(method) && !outbound.contains_key(header::CONTENT_TYPE) {
        outbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("*/*"));
    }

    outbound
}

/// Inbound cookies minus the denied names, rejoined for one header.
fn forwarded_cookies(skipped: &[String], inbound: &HeaderMap) -> String {
    let mut cookies = Vec::new();
    for value in inbound.get_all(header::COOKIE) {
        let Ok(text) = value.to_str() else { continue };
        for (name, value) in response::cookie_pairs(text) {
            if !response::name_in(skipped, name) {
                cookies.push(format!("{name}={value}"));
            }
        }
    }
    cookies.join("; ")
}

/// GET and HEAD requests are forwarded without a body.
fn accepts_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

/// Re-chunks a body stream so no relayed chunk exceeds
/// [`MAX_CHUNK_BYTES`].
fn bounded_chunks<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    upstream.flat_map(|item| {
        let pieces = match item {
            Ok(mut chunk) => {
                let mut pieces = Vec::with_capacity(chunk.len() / MAX_CHUNK_BYTES + 1);
                while chunk.len() > MAX_CHUNK_BYTES {
                    pieces.push(Ok(chunk.split_to(MAX_CHUNK_BYTES)));
                }
                pieces.push(Ok(chunk));
                pieces
            }
            Err(e) => vec![Err(e)],
        };
        futures_util::stream::iter(pieces)
    })
}
