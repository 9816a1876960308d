//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → table.rs (candidate lookup by method + segment count)
//!     → pattern.rs (literal/wildcard segment matching)
//!     → Return: ResolvedRoute { operation, captures } or no match
//!
//! Route Compilation (at startup):
//!     (method, template, operation)[]
//!     → Compile templates into segment matchers
//!     → Reject overlapping patterns
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment equality only)
//! - Deterministic: same input always resolves to the same route

pub mod operation;
pub mod pattern;
pub mod table;

use thiserror::Error;

pub use operation::Operation;
pub use pattern::{PathPattern, Segment};
pub use table::{ResolvedRoute, RouteTable, RouteTableBuilder};

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The path template could not be compiled.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two routes for the same method could match the same path.
    #[error("route {method} {pattern} conflicts with {method} {existing}")]
    Conflict {
        method: String,
        pattern: String,
        existing: String,
    },
}
