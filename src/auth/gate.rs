//! Authentication gate.
//!
//! # Responsibilities
//! - Extract the bearer token from the `Authorization` header
//! - Ask the identity verifier about it, bounded by the request deadline
//! - Reduce the answer to a single `AuthOutcome`
//!
//! # Outcome Mapping
//! ```text
//! no header / not "Bearer " / empty token → Unauthenticated (verifier not called)
//! transport failure / non-2xx / deadline   → VerifierError
//! non-empty review error field             → VerifierError
//! authenticated = false                    → Denied
//! otherwise                                → Granted(user)
//! ```

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::verifier::{IdentityVerifier, UserInfo, VerifierError};
use crate::context::CallContext;

/// Scheme marker expected at the start of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Result of authenticating one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Missing or malformed credentials.
    Unauthenticated,
    /// The identity service could not give an answer.
    VerifierError(VerifierError),
    /// The identity service rejected the token.
    Denied,
    /// The identity service accepted the token.
    Granted(UserInfo),
}

/// Admits or rejects requests based on their bearer token.
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<dyn IdentityVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { verifier }
    }

    /// Token following the bearer scheme marker, if present and non-empty.
    pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
            .filter(|token| !token.is_empty())
    }

    pub async fn authenticate(&self, headers: &HeaderMap, ctx: &CallContext) -> AuthOutcome {
        let Some(token) = Self::bearer_token(headers) else {
            return AuthOutcome::Unauthenticated;
        };

        let verify = self.verifier.verify(ctx, token);
        let review = match tokio::time::timeout_at(ctx.deadline(), verify).await {
            Ok(Ok(review)) => review,
            Ok(Err(e)) => return AuthOutcome::VerifierError(e),
            Err(_) => return AuthOutcome::VerifierError(VerifierError::DeadlineExceeded),
        };

        if !review.error.is_empty() {
            return AuthOutcome::VerifierError(VerifierError::Review(review.error));
        }

        if !review.authenticated {
            return AuthOutcome::Denied;
        }

        AuthOutcome::Granted(review.user.unwrap_or_default())
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}
