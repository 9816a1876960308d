//! Route table and resolver.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Resolve (method, path) to an operation plus wildcard captures
//! - Return an explicit no-match rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc without locks)
//! - Entries indexed by (method, segment count), so only candidates of the
//!   right shape are scanned
//! - Overlapping patterns are rejected at registration, so at most one entry
//!   can ever match; scan order is registration order regardless

use std::collections::HashMap;

use axum::http::Method;

use crate::routing::operation::Operation;
use crate::routing::pattern::{split_path, PathPattern};
use crate::routing::RouteError;

/// A registered route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: Method,
    pub pattern: PathPattern,
    pub operation: Operation,
}

/// Result of a successful resolution. Built fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub operation: Operation,
    pub captures: Vec<String>,
}

/// Builder that validates routes as they are registered.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    entries: Vec<RouteEntry>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route, failing if it could match the same requests as an
    /// existing one.
    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        operation: Operation,
    ) -> Result<Self, RouteError> {
        let pattern = PathPattern::parse(pattern)?;

        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.method == method && e.pattern.overlaps(&pattern))
        {
            return Err(RouteError::Conflict {
                method: method.to_string(),
                pattern: pattern.as_str().to_string(),
                existing: existing.pattern.as_str().to_string(),
            });
        }

        self.entries.push(RouteEntry {
            method,
            pattern,
            operation,
        });
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> RouteTable {
        let mut index: HashMap<(Method, usize), Vec<usize>> = HashMap::new();
        for (i, entry) in self.entries.iter().enumerate() {
            index
                .entry((entry.method.clone(), entry.pattern.segment_count()))
                .or_default()
                .push(i);
        }

        RouteTable {
            entries: self.entries,
            index,
        }
    }
}

/// Immutable routing table.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    index: HashMap<(Method, usize), Vec<usize>>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// The release-management REST surface.
    pub fn release_api() -> Result<Self, RouteError> {
        Ok(Self::builder()
            .route(Method::GET, "/", Operation::Status)?
            .route(Method::GET, "/v1/releases", Operation::List)?
            .route(Method::GET, "/v1/releases/{name}", Operation::Get)?
            .route(Method::POST, "/v1/releases", Operation::Install)?
            .route(Method::POST, "/v1/releases/{name}", Operation::Upgrade)?
            .route(Method::DELETE, "/v1/releases/{name}", Operation::Uninstall)?
            .route(Method::GET, "/v1/releases/{name}/history", Operation::History)?
            .route(Method::POST, "/v1/releases/{name}/history/{rev}", Operation::Rollback)?
            .build())
    }

    /// Resolve a request to its route. Pure: same input, same output.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<ResolvedRoute> {
        let segments = split_path(path);
        let candidates = self.index.get(&(method.clone(), segments.len()))?;

        candidates.iter().find_map(|&i| {
            let entry = &self.entries[i];
            entry.pattern.captures(&segments).map(|captures| ResolvedRoute {
                operation: entry.operation,
                captures,
            })
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
