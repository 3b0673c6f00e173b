//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (Axum setup, mount resolution, route match)
//!     → request.rs (request ID correlation)
//!     → forwarder.rs (rewrite URL and headers, stream to the target)
//!     → response.rs (header and cookie filtering helpers)
//!     → Relay to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use server::ProxyServer;
