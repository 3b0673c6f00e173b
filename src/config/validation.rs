//! Route configuration validation.
//!
//! Serde handles the syntactic side; this module checks semantics
//! before a document is accepted: every effective route needs a
//! usable target and sane timeouts, and added headers must be legal
//! HTTP. Errors carry the offending route id.

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::RouteConfig;

pub fn validate(routes: &[RouteConfig]) -> Result<(), ConfigError> {
    for route in routes {
        validate_route(route)?;
    }
    Ok(())
}

fn validate_route(route: &RouteConfig) -> Result<(), ConfigError> {
    let id = route.id.as_deref().unwrap_or("<unnamed>");

    let target = route
        .response_configuration
        .as_ref()
        .and_then(|r| r.target.as_deref())
        .ok_or_else(|| ConfigError::invalid(id, "responseConfiguration.target is required"))?;
    let url = Url::parse(target).map_err(|e| {
        ConfigError::invalid(id, format!("target {target:?} is not a valid URL: {e}"))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::invalid(
            id,
            format!("target scheme {:?} is not supported", url.scheme()),
        ));
    }

    if let Some(timeouts) = route
        .client_configuration
        .as_ref()
        .and_then(|c| c.timeouts.as_ref())
    {
        let fields = [
            ("timeouts.connect", timeouts.connect),
            ("timeouts.read", timeouts.read),
            ("timeouts.execution", timeouts.execution),
        ];
        for (field, value) in fields {
            if value == Some(0) {
                return Err(ConfigError::invalid(
                    id,
                    format!("{field} must be greater than zero"),
                ));
            }
        }
    }

    let shutdown = route
        .client_configuration
        .as_ref()
        .and_then(|c| c.executor.as_ref())
        .and_then(|e| e.shutdown_timeout);
    if shutdown == Some(0) {
        return Err(ConfigError::invalid(
            id,
            "executor.shutdownTimeout must be greater than zero",
        ));
    }

    if let Some(added) = route
        .request_configuration
        .as_ref()
        .and_then(|r| r.added_headers.as_ref())
    {
        for (name, value) in added {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ConfigError::invalid(
                    id,
                    format!("addedHeaders name {name:?} is not a valid header name"),
                ));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(ConfigError::invalid(
                    id,
                    format!("addedHeaders value for {name:?} is not a valid header value"),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route(value: serde_json::Value) -> RouteConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_a_minimal_route() {
        let r = route(json!({
            "id": "ok",
            "responseConfiguration": {"target": "http://localhost:8080"}
        }));
        assert!(validate(&[r]).is_ok());
    }

    #[test]
    fn rejects_a_route_without_target() {
        let r = route(json!({"id": "broken"}));
        let err = validate(&[r]).unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn rejects_an_unparseable_target() {
        let r = route(json!({
            "id": "broken",
            "responseConfiguration": {"target": "not a url"}
        }));
        assert!(validate(&[r]).is_err());
    }

    #[test]
    fn rejects_non_http_schemes() {
        let r = route(json!({
            "id": "broken",
            "responseConfiguration": {"target": "ftp://host/path"}
        }));
        let err = validate(&[r]).unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let r = route(json!({
            "id": "broken",
            "responseConfiguration": {"target": "http://localhost:8080"},
            "clientConfiguration": {"timeouts": {"execution": 0}}
        }));
        let err = validate(&[r]).unwrap_err();
        assert!(err.to_string().contains("timeouts.execution"));
    }

    #[test]
    fn rejects_a_zero_shutdown_grace() {
        let r = route(json!({
            "id": "broken",
            "responseConfiguration": {"target": "http://localhost:8080"},
            "clientConfiguration": {"executor": {"shutdownTimeout": 0}}
        }));
        let err = validate(&[r]).unwrap_err();
        assert!(err.to_string().contains("shutdownTimeout"));
    }

    #[test]
    fn rejects_malformed_added_headers() {
        let r = route(json!({
            "id": "broken",
            "responseConfiguration": {"target": "http://localhost:8080"},
            "requestConfiguration": {"addedHeaders": {"bad header": "x"}}
        }));
        let err = validate(&[r]).unwrap_err();
        assert!(err.to_string().contains("header name"));
    }
}
