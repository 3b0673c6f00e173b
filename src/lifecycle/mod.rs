//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Compile routes → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain routes (drain.rs) → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Draining is per route, bounded by the route's grace period
//! - Requests arriving while a route drains get an immediate 503

pub mod drain;
pub mod shutdown;

pub use drain::{InFlight, InFlightGuard};
pub use shutdown::Shutdown;
