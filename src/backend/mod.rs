//! Release service backend.
//!
//! # Data Flow
//! ```text
//! Transcoder (structured request)
//!     → client.rs (ReleaseService trait, one method per operation)
//!     → HttpReleaseClient: POST {base_url}/{Method} with JSON body
//!     → types.rs: Reply<T>, the answer's JSON text as received
//!     → back to Transcoder, which relays it unchanged
//! ```
//!
//! # Design Decisions
//! - The service contract is a trait so the pipeline can be exercised
//!   against in-process fakes
//! - A single shared client handles all concurrent requests

pub mod client;
pub mod types;

pub use client::{HttpReleaseClient, ReleaseService};
pub use types::{BackendError, BackendResult, Reply};
