//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Release service connection.
    pub backend: BackendConfig,

    /// Identity verifier (token review) settings.
    pub identity: IdentityConfig,

    /// Authentication gate behavior.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address, e.g. "0.0.0.0:44133". A bare ":44133" binds all interfaces.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:44133".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Bind address with a missing host filled in as `0.0.0.0`.
    pub fn socket_address(&self) -> String {
        if self.bind_address.starts_with(':') {
            format!("0.0.0.0{}", self.bind_address)
        } else {
            self.bind_address.clone()
        }
    }
}

/// Release service connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Service address (host:port).
    pub address: String,

    /// Path prefix under which the service exposes its methods.
    pub service_path: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "localhost:44134".to_string(),
            service_path: "/hapi.services.tiller.ReleaseService".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Identity verifier settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// API server base URL. Empty means discover the in-cluster address.
    pub api_server: String,

    /// File holding the gateway's own credential for the API server.
    pub token_path: String,

    /// PEM bundle used to trust the API server certificate.
    pub ca_cert_path: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_server: String::new(),
            token_path: "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string(),
            ca_cert_path: Some("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt".to_string()),
        }
    }
}

/// Authentication gate settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Serve the status endpoint without a bearer token.
    pub public_status: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds. Also
    /// the deadline for the verifier and backend calls.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
