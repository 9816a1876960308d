//! Identity verifier contract and token review client.
//!
//! # Responsibilities
//! - Define what the auth gate needs from an identity service: token in,
//!   `{authenticated, user, error}` out
//! - Implement it against the Kubernetes TokenReview API
//!
//! # Design Decisions
//! - The verifier reports what the identity service said; turning that into
//!   an admit/reject decision is the gate's job
//! - The per-call timeout is the time left on the inbound request
//! - The gateway authenticates itself to the API server with its own
//!   service-account credential when one is mounted

use std::fs;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IdentityConfig;
use crate::context::CallContext;
use crate::observability::metrics;

const TOKEN_REVIEW_PATH: &str = "/apis/authentication.k8s.io/v1/tokenreviews";

/// Failures talking to the identity service.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// The verifier could not be constructed.
    #[error("verifier configuration error: {0}")]
    Config(String),

    /// The identity service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The identity service answered with a non-success status.
    #[error("identity service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The identity service reported an error while reviewing the token.
    #[error("token review error: {0}")]
    Review(String),

    /// No answer before the request deadline.
    #[error("token review exceeded the request deadline")]
    DeadlineExceeded,
}

/// Identity of an authenticated caller. Opaque to the request pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub username: String,
    pub uid: String,
    pub groups: Vec<String>,
}

/// Outcome of a token review as reported by the identity service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    pub user: Option<UserInfo>,
    /// Empty on success.
    pub error: String,
}

impl TokenReviewStatus {
    pub fn authenticated(user: UserInfo) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
            error: String::new(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }
}

/// Verifies bearer tokens.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(
        &self,
        ctx: &CallContext,
        token: &str,
    ) -> Result<TokenReviewStatus, VerifierError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenReviewRequest<'a> {
    api_version: &'static str,
    kind: &'static str,
    spec: TokenReviewSpec<'a>,
}

#[derive(Debug, Serialize)]
struct TokenReviewSpec<'a> {
    token: &'a str,
}

impl<'a> TokenReviewRequest<'a> {
    fn new(token: &'a str) -> Self {
        Self {
            api_version: "authentication.k8s.io/v1",
            kind: "TokenReview",
            spec: TokenReviewSpec { token },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenReviewResponse {
    status: TokenReviewStatus,
}

/// TokenReview-backed identity verifier.
#[derive(Debug, Clone)]
pub struct TokenReviewClient {
    client: reqwest::Client,
    endpoint: String,
    credential: Option<String>,
}

impl TokenReviewClient {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, VerifierError> {
        let api_server = if config.api_server.is_empty() {
            in_cluster_api_server().ok_or_else(|| {
                VerifierError::Config(
                    "identity.api_server is empty and KUBERNETES_SERVICE_HOST is not set"
                        .to_string(),
                )
            })?
        } else {
            config.api_server.clone()
        };

        let mut builder = reqwest::Client::builder();
        if let Some(ca_path) = config.ca_cert_path.as_deref() {
            match fs::read(ca_path) {
                Ok(pem) => {
                    let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                        VerifierError::Config(format!("invalid CA bundle {}: {}", ca_path, e))
                    })?;
                    builder = builder.add_root_certificate(cert);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %ca_path,
                        error = %e,
                        "CA bundle not readable, using system roots"
                    );
                }
            }
        }
        let client = builder
            .build()
            .map_err(|e| VerifierError::Config(e.to_string()))?;

        let credential = fs::read_to_string(&config.token_path)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if credential.is_none() {
            tracing::warn!(
                path = %config.token_path,
                "No service account credential found; token reviews will be sent without one"
            );
        }

        let endpoint = format!("{}{}", api_server.trim_end_matches('/'), TOKEN_REVIEW_PATH);
        tracing::info!(endpoint = %endpoint, "Token review client initialized");

        Ok(Self {
            client,
            endpoint,
            credential,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn in_cluster_api_server() -> Option<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    if host.contains(':') {
        Some(format!("https://[{}]:{}", host, port))
    } else {
        Some(format!("https://{}:{}", host, port))
    }
}

#[async_trait]
impl IdentityVerifier for TokenReviewClient {
    async fn verify(
        &self,
        ctx: &CallContext,
        token: &str,
    ) -> Result<TokenReviewStatus, VerifierError> {
        let start = Instant::now();

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(ctx.remaining())
            .header("x-request-id", ctx.request_id())
            .json(&TokenReviewRequest::new(token));
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential);
        }

        let result = async {
            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    VerifierError::DeadlineExceeded
                } else {
                    VerifierError::Transport(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(VerifierError::Status {
                    status: status.as_u16(),
                    message: message.trim().to_string(),
                });
            }

            let review: TokenReviewResponse = response
                .json()
                .await
                .map_err(|e| {
                    VerifierError::Transport(format!("invalid token review response: {}", e))
                })?;
            Ok(review.status)
        }
        .await;

        metrics::record_upstream("verifier", if result.is_ok() { "ok" } else { "error" }, start);
        result
    }
}
