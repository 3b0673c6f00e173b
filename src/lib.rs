//! Route-driven HTTP forwarding proxy library.

pub mod config;
pub mod hooks;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::loader::ConfigurationLoader;
pub use config::schema::RoutesConfig;
pub use hooks::ProxyHooks;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
