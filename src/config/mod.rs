//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! route document (JSON)
//!     → substitutor.rs (${...} expansion, path and content)
//!     → loader.rs (parse, id assignment, default-route merge)
//!     → validation.rs (semantic checks)
//!     → RoutesConfig (validated, immutable)
//!     → compiled into a RouteTable at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Every field is optional so a default route can fill the gaps
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod substitutor;
pub mod validation;

pub use loader::{ConfigError, ConfigurationLoader};
pub use schema::{RouteConfig, RoutesConfig};
pub use substitutor::Substitutor;
