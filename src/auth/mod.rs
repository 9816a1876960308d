//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved request headers
//!     → gate.rs (extract "Bearer <token>")
//!     → verifier.rs (token review against the identity service)
//!     → AuthOutcome: Unauthenticated | VerifierError | Denied | Granted
//! ```
//!
//! # Design Decisions
//! - Authentication only; no authorization decisions are made here
//! - Fail closed: anything other than a clean "authenticated" answer rejects

pub mod gate;
pub mod verifier;

pub use gate::{AuthGate, AuthOutcome, BEARER_PREFIX};
pub use verifier::{IdentityVerifier, TokenReviewClient, TokenReviewStatus, UserInfo, VerifierError};
