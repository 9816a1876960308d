//! Path pattern compilation and matching.
//!
//! # Responsibilities
//! - Parse a path template into literal and wildcard segment matchers once
//! - Match a split request path against the compiled segments
//! - Detect overlap between two patterns at registration time
//!
//! # Design Decisions
//! - Literal matching is exact and case-sensitive
//! - A wildcard matches exactly one non-empty segment
//! - Segment counts must be equal; no prefix matching
//! - Wildcards are written `*` or `{name}`; the name is documentation only,
//!   captures are positional
//! - Captures are percent-decoded; literals are compared as sent

use crate::routing::RouteError;

/// A single compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Wildcard,
}

impl Segment {
    fn matches(&self, value: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == value,
            Segment::Wildcard => !value.is_empty(),
        }
    }
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a path template such as `/v1/releases/{name}/history`.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if !raw.starts_with('/') {
            return Err(invalid("pattern must start with '/'"));
        }

        let mut segments = Vec::new();
        for part in split_path(raw) {
            if part.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if part == "*" || (part.starts_with('{') && part.ends_with('}') && part.len() > 2) {
                segments.push(Segment::Wildcard);
                continue;
            }
            if part.contains(['*', '{', '}']) {
                return Err(invalid("wildcards must span a whole segment"));
            }
            segments.push(Segment::Literal(part.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Match already-split path segments, returning percent-decoded wildcard
    /// captures in left-to-right order.
    pub fn captures(&self, path: &[&str]) -> Option<Vec<String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (segment, value) in self.segments.iter().zip(path) {
            if !segment.matches(value) {
                return None;
            }
            if *segment == Segment::Wildcard {
                captures.push(decode_segment(value));
            }
        }
        Some(captures)
    }

    /// Returns true if some path could match both patterns.
    pub fn overlaps(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }
}

/// Percent-decode one path segment. Invalid UTF-8 is replaced, not rejected.
fn decode_segment(value: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(value.as_bytes())).into_owned()
}

/// Split a request path into segments. The root path `/` has no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}
