//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

use crate::config::schema::RoutesConfig;
use crate::config::substitutor::{CycleError, Substitutor};
use crate::config::validation;

/// Identifier given to an anonymous default route.
pub const DEFAULT_ROUTE_ID: &str = "default";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {0:?} does not exist")]
    Missing(String),

    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot substitute configuration variables: {0}")]
    Substitution(#[from] CycleError),

    #[error("route {route}: {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("route {route}: cannot build outbound client: {source}")]
    Client {
        route: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(route: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidRoute {
            route: route.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reads the JSON route document, resolving `${...}` expressions in
/// both the configured path and the file content before parsing.
pub struct ConfigurationLoader {
    path: String,
    substitutor: Substitutor,
}

impl ConfigurationLoader {
    /// A loader resolving variables against the process environment.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_substitutor(path, Substitutor::from_env())
    }

    pub fn with_substitutor(path: impl Into<String>, substitutor: Substitutor) -> Self {
        Self {
            path: path.into(),
            substitutor,
        }
    }

    /// Loads, substitutes, parses and validates the document.
    ///
    /// Returns `Ok(None)` when the document declares neither a default
    /// route nor any routes, which leaves the proxy disabled. Routes
    /// without an id get a generated one; the default route is merged
    /// into every declared route, or becomes the sole route when the
    /// document has no `routes` key at all. An explicitly empty routes
    /// list stays empty.
    pub fn load(&self) -> Result<Option<RoutesConfig>, ConfigError> {
        let path_text = self.substitutor.replace(&self.path)?;
        let path = Path::new(&path_text);
        if !path.is_file() {
            return Err(ConfigError::Missing(path_text));
        }
        let raw = fs::read_to_string(path)?;
        let content = self.substitutor.replace(&raw)?;
        let mut config: RoutesConfig = serde_json::from_str(&content)?;

        let declared = config.routes.as_ref().map_or(0, |r| r.len());
        if config.default_route.is_none() && declared == 0 {
            tracing::debug!(path = %path_text, "configuration declares no routes");
            return Ok(None);
        }

        if let Some(routes) = config.routes.as_mut() {
            for route in routes.iter_mut() {
                if route.id.is_none() {
                    route.id = Some(Uuid::new_v4().to_string());
                }
            }
        }

        if let Some(mut default) = config.default_route.take() {
            if default.id.is_none() {
                default.id = Some(DEFAULT_ROUTE_ID.to_string());
            }
            config.routes = match config.routes.take() {
                None => Some(vec![default.clone()]),
                Some(routes) => Some(
                    routes
                        .into_iter()
                        .map(|route| route.merged_with(&default))
                        .collect(),
                ),
            };
            config.default_route = Some(default);
        }

        validation::validate(config.routes())?;
        tracing::debug!(
            path = %path_text,
            routes = config.routes().len(),
            "route configuration loaded"
        );
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct TempConfig(PathBuf);

    impl TempConfig {
        fn write(content: &str) -> Self {
            let path = std::env::temp_dir().join(format!("route-relay-{}.json", Uuid::new_v4()));
            fs::write(&path, content).unwrap();
            Self(path)
        }

        fn path(&self) -> &str {
            self.0.to_str().unwrap()
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> Substitutor {
        Substitutor::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn missing_file_is_reported() {
        let loader = ConfigurationLoader::new("/definitely/not/here.json");
        assert!(matches!(loader.load(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn invalid_json_is_reported() {
        let file = TempConfig::write("routes: nope");
        let loader = ConfigurationLoader::new(file.path());
        assert!(matches!(loader.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn empty_document_disables_the_proxy() {
        let file = TempConfig::write("{}");
        let loader = ConfigurationLoader::new(file.path());
        assert!(loader.load().unwrap().is_none());
    }

    #[test]
    fn empty_routes_without_default_disables_the_proxy() {
        let file = TempConfig::write(r#"{"routes": []}"#);
        let loader = ConfigurationLoader::new(file.path());
        assert!(loader.load().unwrap().is_none());
    }

    #[test]
    fn routes_get_generated_ids() {
        let file = TempConfig::write(
            r#"{"routes": [{"responseConfiguration": {"target": "http://localhost:8080"}}]}"#,
        );
        let config = ConfigurationLoader::new(file.path()).load().unwrap().unwrap();
        let id = config.routes()[0].id.as_deref().unwrap();
        assert!(!id.is_empty());
        assert_ne!(id, DEFAULT_ROUTE_ID);
    }

    #[test]
    fn default_route_becomes_the_sole_route() {
        let file = TempConfig::write(
            r#"{"defaultRoute": {"responseConfiguration": {"target": "http://localhost:8080"}}}"#,
        );
        let config = ConfigurationLoader::new(file.path()).load().unwrap().unwrap();
        assert_eq!(config.routes().len(), 1);
        assert_eq!(config.routes()[0].id.as_deref(), Some(DEFAULT_ROUTE_ID));
    }

    #[test]
    fn explicitly_empty_routes_stay_empty() {
        let file = TempConfig::write(
            r#"{
                "defaultRoute": {"responseConfiguration": {"target": "http://localhost:8080"}},
                "routes": []
            }"#,
        );
        let config = ConfigurationLoader::new(file.path()).load().unwrap().unwrap();
        assert!(config.routes().is_empty());
    }

    #[test]
    fn declared_routes_inherit_from_the_default_route() {
        let file = TempConfig::write(
            r#"{
                "defaultRoute": {
                    "responseConfiguration": {"target": "http://localhost:8080"},
                    "clientConfiguration": {"timeouts": {"execution": 123}}
                },
                "routes": [
                    {"id": "one", "requestConfiguration": {"prefix": "/one"}},
                    {
                        "id": "two",
                        "responseConfiguration": {"target": "http://localhost:9090"}
                    }
                ]
            }"#,
        );
        let config = ConfigurationLoader::new(file.path()).load().unwrap().unwrap();
        let routes = config.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(
            routes[0]
                .response_configuration
                .as_ref()
                .unwrap()
                .target
                .as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(
            routes[1]
                .response_configuration
                .as_ref()
                .unwrap()
                .target
                .as_deref(),
            Some("http://localhost:9090")
        );
        assert_eq!(
            routes[1]
                .client_configuration
                .as_ref()
                .unwrap()
                .timeouts
                .as_ref()
                .unwrap()
                .execution,
            Some(123)
        );
    }

    #[test]
    fn variables_are_substituted_in_the_content() {
        let file = TempConfig::write(
            r#"{"routes": [{"responseConfiguration": {"target": "http://localhost:${PORT}"}}]}"#,
        );
        let loader =
            ConfigurationLoader::with_substitutor(file.path(), vars(&[("PORT", "7777")]));
        let config = loader.load().unwrap().unwrap();
        assert_eq!(
            config.routes()[0]
                .response_configuration
                .as_ref()
                .unwrap()
                .target
                .as_deref(),
            Some("http://localhost:7777")
        );
    }

    #[test]
    fn variables_are_substituted_in_the_path() {
        let file = TempConfig::write(
            r#"{"routes": [{"responseConfiguration": {"target": "http://localhost:8080"}}]}"#,
        );
        let loader = ConfigurationLoader::with_substitutor(
            "${CONFIG_FILE}",
            vars(&[("CONFIG_FILE", file.path())]),
        );
        assert!(loader.load().unwrap().is_some());
    }

    #[test]
    fn substitution_cycles_are_reported() {
        let file = TempConfig::write(r#"{"routes": [{"id": "${a}"}]}"#);
        let loader = ConfigurationLoader::with_substitutor(
            file.path(),
            vars(&[("a", "${b}"), ("b", "${a}")]),
        );
        assert!(matches!(
            loader.load(),
            Err(ConfigError::Substitution(_))
        ));
    }

    #[test]
    fn invalid_routes_are_rejected() {
        let file = TempConfig::write(r#"{"routes": [{"id": "broken"}]}"#);
        let err = ConfigurationLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoute { .. }));
        assert!(err.to_string().contains("broken"));
    }
}
