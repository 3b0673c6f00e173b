//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, mount-relative path)
//!     → router.rs (ordered route scan)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched ProxyRoute or no match
//!
//! Route Compilation (at startup):
//!     RoutesConfig
//!     → Parse targets, added headers
//!     → Build per-route outbound clients
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (case-insensitive equality only)
//! - Deterministic: first match in declaration order wins

pub mod matcher;
pub mod router;

pub use matcher::RouteMatcher;
pub use router::{ProxyRoute, RequestPolicy, ResponsePolicy, RouteTable};
