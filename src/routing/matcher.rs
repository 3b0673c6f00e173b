//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method (whole-string, case-insensitive)
//! - Match the mount-relative path (whole-string, case-insensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Absent condition = always matches (wildcard)
//! - Path comparison is equality, not a prefix scan
//! - No regex to guarantee O(n) matching

/// Match conditions compiled from one route.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    method: Option<String>,
    prefix: Option<String>,
}

impl RouteMatcher {
    pub fn new(method: Option<String>, prefix: Option<String>) -> Self {
        Self { method, prefix }
    }

    /// Returns true when both conditions accept the request.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        accepts(self.method.as_deref(), method) && accepts(self.prefix.as_deref(), path)
    }
}

fn accepts(expected: Option<&str>, actual: &str) -> bool {
    expected.map_or(true, |e| e.eq_ignore_ascii_case(actual))
}
