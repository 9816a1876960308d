//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, catch-all handler)
//!     → request.rs (request ID assigned or kept)
//!     → routing: resolve method + path to an operation (404 on miss)
//!     → auth: bearer token review (401/403/500)
//!     → dispatch: transcode and call the release service
//!     → response.rs (error statuses and JSON error bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeGatewayRequestId, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{AppState, HttpServer, StartupError};
