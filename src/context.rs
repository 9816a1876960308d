//! Request-scoped call context.
//!
//! A `CallContext` is created for every inbound request and handed to both
//! downstream calls (identity verifier and release service). It carries the
//! request id for correlation and the deadline derived from the inbound
//! request's timeout, so a request that runs out of time stops waiting on its
//! downstream calls too.
//!
//! Client disconnects need no extra plumbing: hyper drops the handler future,
//! which drops any in-flight downstream future with it.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    deadline: Instant,
}

impl CallContext {
    /// Context whose deadline is `timeout` from now.
    pub fn new(request_id: impl Into<String>, timeout: Duration) -> Self {
        Self::with_deadline(request_id, Instant::now() + timeout)
    }

    pub fn with_deadline(request_id: impl Into<String>, deadline: Instant) -> Self {
        Self {
            request_id: request_id.into(),
            deadline,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}
