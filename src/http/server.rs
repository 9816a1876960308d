//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the route table and the operation dispatcher at startup
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, timeout backstop)
//! - Run each request through resolve → authenticate → dispatch
//! - Serve until the shutdown signal fires
//!
//! # Design Decisions
//! - Authentication happens after route resolution, so unknown paths never
//!   reach the identity service
//! - The body is read, and its size limit enforced, only after
//!   authentication succeeds, so oversized requests still get 404/401 first
//! - Downstream calls run against a deadline slightly inside the request
//!   timeout, so a hung verifier or backend ends in this handler's 500
//!   rather than the timeout layer's
//! - Every request gets exactly one response; a client disconnect drops the
//!   handler future, which cancels any in-flight downstream call

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{AuthGate, AuthOutcome, IdentityVerifier};
use crate::backend::ReleaseService;
use crate::config::GatewayConfig;
use crate::context::CallContext;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::http::request::{request_id, request_id_header, MakeGatewayRequestId};
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::routing::{Operation, RouteError, RouteTable};

/// Slice of the request timeout kept back from downstream calls.
const DEADLINE_MARGIN: Duration = Duration::from_millis(250);

/// Deadline for the verifier and backend calls of a request bounded by
/// `request_timeout`. Always strictly shorter for a non-zero timeout.
pub fn call_budget(request_timeout: Duration) -> Duration {
    request_timeout.saturating_sub(DEADLINE_MARGIN.min(request_timeout / 4))
}

/// Errors detected while assembling the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error("invalid handler registry: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub auth: AuthGate,
    pub dispatcher: Arc<Dispatcher>,
    /// Deadline budget for downstream calls, see [`call_budget`].
    pub call_budget: Duration,
    pub max_body_size: usize,
    pub public_status: bool,
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Assemble the server. Fails if the route table is ambiguous or any
    /// routed operation lacks a handler.
    pub fn new(
        config: GatewayConfig,
        verifier: Arc<dyn IdentityVerifier>,
        backend: Arc<dyn ReleaseService>,
    ) -> Result<Self, StartupError> {
        let routes = RouteTable::release_api()?;
        let dispatcher = Dispatcher::release_api(backend)?;
        dispatcher.ensure_covers(&routes)?;

        tracing::debug!(routes = routes.len(), handlers = dispatcher.len(), "Route table built");

        let state = AppState {
            routes: Arc::new(routes),
            auth: AuthGate::new(verifier),
            dispatcher: Arc::new(dispatcher),
            call_budget: call_budget(Duration::from_secs(config.timeouts.request_secs)),
            max_body_size: config.security.max_body_size,
            public_status: config.auth.public_status,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);

        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            // Backstop only; the handler answers first within `call_budget`.
            .layer(TimeoutLayer::with_status_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(request_id_header()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header(), MakeGatewayRequestId))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler for the release API.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let (response, operation) = handle(&state, request).await;

    metrics::record_request(method.as_str(), response.status().as_u16(), operation, start);
    response
}

async fn handle(state: &AppState, request: Request<Body>) -> (Response, &'static str) {
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // 1. Resolve
    let Some(route) = state.routes.resolve(&method, &path) else {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            "No route matched"
        );
        let err = GatewayError::NotFound {
            method: method.to_string(),
            path,
        };
        return (err.into_response(), "none");
    };
    let operation = route.operation;
    let ctx = CallContext::new(request_id, state.call_budget);

    tracing::debug!(
        request_id = %ctx.request_id(),
        method = %method,
        path = %path,
        operation = %operation,
        "Route resolved"
    );

    let (parts, body) = request.into_parts();

    // 2. Authenticate
    if !(operation == Operation::Status && state.public_status) {
        match state.auth.authenticate(&parts.headers, &ctx).await {
            AuthOutcome::Granted(user) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    username = %user.username,
                    "Authenticated"
                );
            }
            AuthOutcome::Unauthenticated => {
                tracing::info!(request_id = %ctx.request_id(), "Missing or malformed bearer token");
                return (GatewayError::Unauthenticated.into_response(), operation.as_str());
            }
            AuthOutcome::Denied => {
                tracing::info!(request_id = %ctx.request_id(), "Token not authenticated");
                return (GatewayError::Denied.into_response(), operation.as_str());
            }
            AuthOutcome::VerifierError(e) => {
                let err = GatewayError::Verifier(e);
                tracing::error!(
                    request_id = %ctx.request_id(),
                    error = %err,
                    "Token validation failed"
                );
                return (err.into_response(), operation.as_str());
            }
        }
    }

    // 3. Read body
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = GatewayError::Body(e.to_string());
            tracing::info!(
                request_id = %ctx.request_id(),
                error = %err,
                "Rejected request body"
            );
            return (err.into_response(), operation.as_str());
        }
    };

    // 4. Dispatch
    let query = parts.uri.query().map(str::to_string);
    let response = state.dispatcher.dispatch(route, &ctx, query, body).await;
    (response, operation.as_str())
}
