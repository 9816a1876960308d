//! Release Gateway Library
//!
//! An authenticating REST gateway in front of a release-management RPC
//! service. Requests are resolved to an operation, their bearer token is
//! checked with an identity service, and the operation is forwarded to the
//! release service with the response relayed as JSON.

pub mod auth;
pub mod backend;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod transcode;

pub use config::schema::GatewayConfig;
pub use context::CallContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
