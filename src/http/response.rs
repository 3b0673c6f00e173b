//! Response handling and transformation.
//!
//! # Responsibilities
//! - Build the proxy's own plain-text answers
//! - Strip hop-by-hop headers from relayed traffic
//! - Parse cookie headers for name-based filtering
//! - Repair Content-Length on relayed 304 answers
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - Hop-by-hop headers never cross the proxy in either direction
//! - Failures the upstream never answered become a plain-text 500

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Headers scoped to a single hop, dropped in both directions.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Case-insensitive membership test for configured name lists.
pub fn name_in(list: &[String], name: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(name))
}

/// Splits a `Cookie` header into name/value pairs.
pub fn cookie_pairs(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header.split(';').filter_map(|pair| {
        let pair = pair.trim();
        if pair.is_empty() {
            return None;
        }
        match pair.split_once('=') {
            Some((name, value)) => Some((name.trim(), value)),
            None => Some((pair, "")),
        }
    })
}

/// Cookie name announced by a `Set-Cookie` value.
pub fn set_cookie_name(value: &str) -> &str {
    value.split_once('=').map_or(value, |(name, _)| name).trim()
}

/// 304 answers carry no body; make that explicit when the upstream
/// left Content-Length out.
pub fn fix_not_modified(status: StatusCode, headers: &mut HeaderMap) {
    if status == StatusCode::NOT_MODIFIED && !headers.contains_key(header::CONTENT_LENGTH) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    }
}

/// A plain-text answer produced by the proxy itself.
pub fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_recognised() {
        assert!(is_hop_by_hop(&header::CONNECTION));
        assert!(is_hop_by_hop(&header::TRANSFER_ENCODING));
        assert!(!is_hop_by_hop(&header::CONTENT_TYPE));
        assert!(!is_hop_by_hop(&header::CONTENT_LENGTH));
    }

    #[test]
    fn name_lists_match_case_insensitively() {
        let list = vec!["X-Secret".to_string()];
        assert!(name_in(&list, "x-secret"));
        assert!(name_in(&list, "X-SECRET"));
        assert!(!name_in(&list, "x-secrets"));
    }

    #[test]
    fn cookie_pairs_are_split_and_trimmed() {
        let pairs: Vec<_> = cookie_pairs("a=1; session=abc ;bare; b=x=y").collect();
        assert_eq!(
            pairs,
            vec![("a", "1"), ("session", "abc"), ("bare", ""), ("b", "x=y")]
        );
    }

    #[test]
    fn set_cookie_names_stop_at_the_first_equals() {
        assert_eq!(set_cookie_name("session=abc; Path=/"), "session");
        assert_eq!(set_cookie_name("bare"), "bare");
    }

    #[test]
    fn not_modified_gets_an_explicit_zero_length() {
        let mut headers = HeaderMap::new();
        fix_not_modified(StatusCode::NOT_MODIFIED, &mut headers);
        assert_eq!(headers[header::CONTENT_LENGTH], "0");
    }

    #[test]
    fn existing_content_length_is_left_alone() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        fix_not_modified(StatusCode::NOT_MODIFIED, &mut headers);
        assert_eq!(headers[header::CONTENT_LENGTH], "12");
    }

    #[test]
    fn other_statuses_are_untouched() {
        let mut headers = HeaderMap::new();
        fix_not_modified(StatusCode::OK, &mut headers);
        assert!(!headers.contains_key(header::CONTENT_LENGTH));
    }
}
