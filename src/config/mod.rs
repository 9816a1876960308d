//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)          CLI flags (--listen, --proxy-addr)
//!     → loader.rs (parse & deserialize)
//!     → flag overrides applied in main
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup by HttpServer and the clients
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart, which keeps
//!   the route table and clients fixed for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, BackendConfig, GatewayConfig, IdentityConfig, ListenerConfig, ObservabilityConfig,
    SecurityConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
