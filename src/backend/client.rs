//! Release service client.
//!
//! # Responsibilities
//! - Define the `ReleaseService` contract the transcoders call
//! - Provide an HTTP/JSON implementation over a pooled connection
//! - Bound each call by the request deadline and forward correlation headers
//!
//! # Design Decisions
//! - One client instance is shared by every request task. The underlying
//!   hyper-util client is a connection pool that multiplexes independent
//!   calls (HTTP/2 streams or pooled HTTP/1.1 connections), so callers never
//!   serialize on a single handle
//! - Exactly one attempt per call; failures go back to the caller
//! - Non-2xx answers carry the service's message, which is for server logs
//! - Success bodies are checked to be one JSON value and then kept as text

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::backend::types::*;
use crate::config::BackendConfig;
use crate::context::CallContext;
use crate::observability::metrics;

/// Header carrying the inbound request id to the service.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying the time left before the inbound request's deadline.
pub const X_REQUEST_TIMEOUT_MS: &str = "x-request-timeout-ms";

const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// The release-management RPC surface.
///
/// Implementations must be safe to call concurrently from many request
/// tasks through a shared reference.
#[async_trait]
pub trait ReleaseService: Send + Sync {
    async fn list_releases(
        &self,
        ctx: &CallContext,
        req: ListReleasesRequest,
    ) -> BackendResult<Reply<ListReleasesResponse>>;

    async fn get_release_content(
        &self,
        ctx: &CallContext,
        req: GetReleaseContentRequest,
    ) -> BackendResult<Reply<GetReleaseContentResponse>>;

    async fn install_release(
        &self,
        ctx: &CallContext,
        req: InstallReleaseRequest,
    ) -> BackendResult<Reply<InstallReleaseResponse>>;

    async fn update_release(
        &self,
        ctx: &CallContext,
        req: UpdateReleaseRequest,
    ) -> BackendResult<Reply<UpdateReleaseResponse>>;

    async fn uninstall_release(
        &self,
        ctx: &CallContext,
        req: UninstallReleaseRequest,
    ) -> BackendResult<Reply<UninstallReleaseResponse>>;

    async fn get_history(
        &self,
        ctx: &CallContext,
        req: GetHistoryRequest,
    ) -> BackendResult<Reply<GetHistoryResponse>>;

    async fn rollback_release(
        &self,
        ctx: &CallContext,
        req: RollbackReleaseRequest,
    ) -> BackendResult<Reply<RollbackReleaseResponse>>;
}

/// JSON-over-HTTP release service client.
#[derive(Clone, Debug)]
pub struct HttpReleaseClient {
    client: Client<HttpConnector, Body>,
    /// Base URL of the service, e.g. `http://localhost:44134/hapi.services.tiller.ReleaseService`.
    base_url: String,
}

impl HttpReleaseClient {
    /// Create a client for the configured service address.
    ///
    /// No connection is made here; connections are opened lazily and
    /// pooled.
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        let base_url = format!(
            "http://{}/{}",
            config.address,
            config.service_path.trim_matches('/')
        );
        base_url.parse::<Uri>().map_err(|e| {
            BackendError::Transport(format!(
                "invalid backend address '{}': {}",
                config.address, e
            ))
        })?;

        tracing::info!(base_url = %base_url, "Release service client initialized");

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn invoke<Req, Res>(
        &self,
        ctx: &CallContext,
        method: &'static str,
        req: Req,
    ) -> BackendResult<Res>
    where
        Req: Serialize + Send,
        Res: DeserializeOwned,
    {
        let payload = serde_json::to_vec(&req)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/{}", self.base_url, method))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(X_REQUEST_ID, ctx.request_id())
            .header(X_REQUEST_TIMEOUT_MS, ctx.remaining().as_millis().to_string())
            .body(Body::from(payload))
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let start = Instant::now();
        let call = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| BackendError::Transport(e.to_string()))?;

            let status = response.status();
            let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
                .await
                .map_err(|e| {
                    BackendError::Transport(format!("failed to read response body: {}", e))
                })?;

            if !status.is_success() {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    message: String::from_utf8_lossy(&body).trim().to_string(),
                });
            }

            Ok(serde_json::from_slice(&body)?)
        };

        let result = match tokio::time::timeout_at(ctx.deadline(), call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::DeadlineExceeded),
        };

        metrics::record_upstream("backend", if result.is_ok() { "ok" } else { "error" }, start);
        tracing::debug!(
            request_id = %ctx.request_id(),
            method,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Release service call finished"
        );

        result
    }
}

#[async_trait]
impl ReleaseService for HttpReleaseClient {
    async fn list_releases(
        &self,
        ctx: &CallContext,
        req: ListReleasesRequest,
    ) -> BackendResult<Reply<ListReleasesResponse>> {
        self.invoke(ctx, "ListReleases", req).await
    }

    async fn get_release_content(
        &self,
        ctx: &CallContext,
        req: GetReleaseContentRequest,
    ) -> BackendResult<Reply<GetReleaseContentResponse>> {
        self.invoke(ctx, "GetReleaseContent", req).await
    }

    async fn install_release(
        &self,
        ctx: &CallContext,
        req: InstallReleaseRequest,
    ) -> BackendResult<Reply<InstallReleaseResponse>> {
        self.invoke(ctx, "InstallRelease", req).await
    }

    async fn update_release(
        &self,
        ctx: &CallContext,
        req: UpdateReleaseRequest,
    ) -> BackendResult<Reply<UpdateReleaseResponse>> {
        self.invoke(ctx, "UpdateRelease", req).await
    }

    async fn uninstall_release(
        &self,
        ctx: &CallContext,
        req: UninstallReleaseRequest,
    ) -> BackendResult<Reply<UninstallReleaseResponse>> {
        self.invoke(ctx, "UninstallRelease", req).await
    }

    async fn get_history(
        &self,
        ctx: &CallContext,
        req: GetHistoryRequest,
    ) -> BackendResult<Reply<GetHistoryResponse>> {
        self.invoke(ctx, "GetHistory", req).await
    }

    async fn rollback_release(
        &self,
        ctx: &CallContext,
        req: RollbackReleaseRequest,
    ) -> BackendResult<Reply<RollbackReleaseResponse>> {
        self.invoke(ctx, "RollbackRelease", req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> BackendConfig {
        BackendConfig {
            address: address.to_string(),
            ..BackendConfig::default()
        }
    }

    #[tokio::test]
    async fn test_base_url() {
        let client = HttpReleaseClient::new(&config("localhost:44134")).unwrap();
        assert_eq!(
            client.base_url(),
            "http://localhost:44134/hapi.services.tiller.ReleaseService"
        );
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        assert!(HttpReleaseClient::new(&config("not a host")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let client = HttpReleaseClient::new(&config("127.0.0.1:9")).unwrap();
        let ctx = CallContext::new("req-1", Duration::from_secs(5));
        let err = client
            .get_release_content(&ctx, GetReleaseContentRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "got {err:?}");
    }
}
