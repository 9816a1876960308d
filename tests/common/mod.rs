//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use release_gateway::auth::{IdentityVerifier, TokenReviewStatus, UserInfo, VerifierError};
use release_gateway::backend::types::*;
use release_gateway::backend::{BackendError, BackendResult, ReleaseService, Reply};
use release_gateway::config::GatewayConfig;
use release_gateway::{CallContext, HttpServer};

/// What the fake identity service answers.
#[derive(Clone, Copy)]
pub enum Verdict {
    Allow,
    Deny,
    ReviewError,
    Fail,
    /// Never answers.
    Hang,
}

pub struct StaticVerifier {
    verdict: Verdict,
    calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl StaticVerifier {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(
        &self,
        _ctx: &CallContext,
        token: &str,
    ) -> Result<TokenReviewStatus, VerifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());

        match self.verdict {
            Verdict::Allow => Ok(TokenReviewStatus::authenticated(UserInfo {
                username: "system:serviceaccount:default:deployer".into(),
                ..UserInfo::default()
            })),
            Verdict::Deny => Ok(TokenReviewStatus::unauthenticated()),
            Verdict::ReviewError => Ok(TokenReviewStatus {
                error: "token lookup failed".into(),
                ..TokenReviewStatus::unauthenticated()
            }),
            Verdict::Fail => Err(VerifierError::Transport("connection refused".into())),
            Verdict::Hang => std::future::pending().await,
        }
    }
}

/// In-process release service that records every call.
#[derive(Default)]
pub struct RecordingBackend {
    fail: bool,
    delay: Option<Duration>,
    canned: Option<&'static str>,
    calls: Mutex<Vec<(&'static str, Value)>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    /// Answers normally, but only after `delay`.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Answers every call with exactly `text`.
    pub fn replying(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            canned: Some(text),
            ..Self::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Method name and JSON form of the most recent request.
    pub fn last(&self) -> Option<(&'static str, Value)> {
        self.calls.lock().unwrap().last().cloned()
    }

    async fn record<T: Serialize>(&self, method: &'static str, req: &T) -> BackendResult<()> {
        let value = serde_json::to_value(req).unwrap();
        self.calls.lock().unwrap().push((method, value));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(BackendError::Status {
                status: 500,
                message: "secret backend detail".into(),
            });
        }
        Ok(())
    }

    fn reply<T: Serialize>(&self, typed: T) -> BackendResult<Reply<T>> {
        let reply = match self.canned {
            Some(text) => Reply::from_json(text)?,
            None => Reply::encode(&typed)?,
        };
        Ok(reply)
    }
}

pub fn release(name: &str, version: i32) -> Release {
    Release {
        name: name.to_string(),
        version,
        namespace: "default".into(),
        manifest: "---\nkind: ConfigMap\n".into(),
        ..Release::default()
    }
}

#[async_trait]
impl ReleaseService for RecordingBackend {
    async fn list_releases(
        &self,
        _ctx: &CallContext,
        req: ListReleasesRequest,
    ) -> BackendResult<Reply<ListReleasesResponse>> {
        self.record("ListReleases", &req).await?;
        self.reply(ListReleasesResponse {
            count: 1,
            total: 1,
            releases: vec![release("alpha", 1)],
            ..ListReleasesResponse::default()
        })
    }

    async fn get_release_content(
        &self,
        _ctx: &CallContext,
        req: GetReleaseContentRequest,
    ) -> BackendResult<Reply<GetReleaseContentResponse>> {
        self.record("GetReleaseContent", &req).await?;
        self.reply(GetReleaseContentResponse {
            release: Some(release(&req.name, req.revision)),
        })
    }

    async fn install_release(
        &self,
        _ctx: &CallContext,
        req: InstallReleaseRequest,
    ) -> BackendResult<Reply<InstallReleaseResponse>> {
        self.record("InstallRelease", &req).await?;
        self.reply(InstallReleaseResponse {
            release: Some(release(&req.name, 1)),
        })
    }

    async fn update_release(
        &self,
        _ctx: &CallContext,
        req: UpdateReleaseRequest,
    ) -> BackendResult<Reply<UpdateReleaseResponse>> {
        self.record("UpdateRelease", &req).await?;
        self.reply(UpdateReleaseResponse {
            release: Some(release(&req.name, 2)),
        })
    }

    async fn uninstall_release(
        &self,
        _ctx: &CallContext,
        req: UninstallReleaseRequest,
    ) -> BackendResult<Reply<UninstallReleaseResponse>> {
        self.record("UninstallRelease", &req).await?;
        self.reply(UninstallReleaseResponse {
            release: Some(release(&req.name, 1)),
            ..UninstallReleaseResponse::default()
        })
    }

    async fn get_history(
        &self,
        _ctx: &CallContext,
        req: GetHistoryRequest,
    ) -> BackendResult<Reply<GetHistoryResponse>> {
        self.record("GetHistory", &req).await?;
        self.reply(GetHistoryResponse {
            releases: vec![release(&req.name, 2), release(&req.name, 1)],
        })
    }

    async fn rollback_release(
        &self,
        _ctx: &CallContext,
        req: RollbackReleaseRequest,
    ) -> BackendResult<Reply<RollbackReleaseResponse>> {
        self.record("RollbackRelease", &req).await?;
        self.reply(RollbackReleaseResponse {
            release: Some(release(&req.name, req.revision)),
        })
    }
}

/// The fully layered gateway router.
pub fn gateway(
    config: GatewayConfig,
    verifier: Arc<StaticVerifier>,
    backend: Arc<RecordingBackend>,
) -> Router {
    HttpServer::new(config, verifier, backend).unwrap().router()
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Send one request through `router`; returns the status and raw body.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

/// How the mock release service answers.
#[derive(Clone, Copy)]
pub enum MockMode {
    Echo,
    Fail,
    Slow(Duration),
    /// Answers every call with exactly this JSON text.
    Raw(&'static str),
}

/// One call observed by the mock release service.
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub method: String,
    pub request_id: Option<String>,
    pub timeout_ms: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    mode: MockMode,
    seen: Arc<Mutex<Vec<SeenCall>>>,
}

async fn mock_handler(
    State(state): State<MockState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.seen.lock().unwrap().push(SeenCall {
        method: method.clone(),
        request_id: header("x-request-id"),
        timeout_ms: header("x-request-timeout-ms"),
        body: body.clone(),
    });

    match state.mode {
        MockMode::Fail => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "release store unavailable").into_response()
        }
        MockMode::Slow(delay) => tokio::time::sleep(delay).await,
        MockMode::Raw(text) => {
            return ([("content-type", "application/json")], text).into_response();
        }
        MockMode::Echo => {}
    }

    let name = body.get("name").cloned().unwrap_or(Value::Null);
    let reply = match method.as_str() {
        "GetHistory" => json!({
            "releases": [{ "name": name, "version": 3 }, { "name": name, "version": 2 }]
        }),
        "ListReleases" => json!({ "count": 0 }),
        _ => json!({ "release": { "name": name, "version": 1 } }),
    };
    axum::Json(reply).into_response()
}

/// Start a JSON release service on an ephemeral port.
pub async fn start_mock_release_service(
    mode: MockMode,
) -> (SocketAddr, Arc<Mutex<Vec<SeenCall>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        mode,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/hapi.services.tiller.ReleaseService/{method}", post(mock_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, seen)
}
