//! Transcoding between the REST surface and the release service.
//!
//! # Data Flow
//! ```text
//! TranscodeInput { captures, query, body }
//!     → decode body into the operation's request (body operations)
//!     → query.rs: populate declared fields from the query string (read operations)
//!     → bind path captures (release name, revision)
//!     → one ReleaseService call, bounded by the request deadline
//!     → relay the service's JSON text unchanged as the response body
//! ```
//!
//! # Design Decisions
//! - One generic implementation (`Transcode<R>`) carries the shared shape;
//!   each operation only declares its types, inputs and service method
//! - Captures are applied last, so the URL wins over body values
//! - Nothing is written until the backend answer is known; the caller gets
//!   either the full body or an error

pub mod operations;
pub mod query;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::backend::{BackendError, BackendResult, ReleaseService};
use crate::context::CallContext;
use crate::routing::Operation;

pub use operations::{
    GetRelease, InstallRelease, ListReleases, ReleaseHistory, RollbackRelease, StatusReport,
    StatusTranscoder, UninstallRelease, UpgradeRelease,
};
pub use query::{FieldKind, QueryField, QueryFields};

/// Errors produced while transcoding a request.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The request body is not valid JSON for the operation.
    #[error("malformed request body: {0}")]
    Body(#[source] serde_json::Error),

    /// A query parameter value does not fit its field.
    #[error("invalid value '{value}' for query parameter '{field}'")]
    Query { field: String, value: String },

    /// A path segment does not fit its field.
    #[error("invalid value '{value}' for path parameter '{name}'")]
    Capture { name: &'static str, value: String },

    /// The route produced fewer captures than the operation binds.
    #[error("route is missing path capture #{0}")]
    MissingCapture(usize),

    /// The release service call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Internal (de)serialization failure.
    #[error("codec error: {0}")]
    Codec(#[source] serde_json::Error),
}

impl TranscodeError {
    /// True when the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranscodeError::Body(_) | TranscodeError::Query { .. } | TranscodeError::Capture { .. }
        )
    }
}

/// Everything a transcoder may read from the inbound request.
#[derive(Debug, Clone, Default)]
pub struct TranscodeInput {
    /// Wildcard captures in path order.
    pub captures: Vec<String>,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub body: Bytes,
}

/// Turns one inbound request into a JSON response body.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        ctx: &CallContext,
        input: TranscodeInput,
    ) -> Result<Bytes, TranscodeError>;
}

/// Per-operation description consumed by [`Transcode`].
pub trait Rpc: Send + Sync + 'static {
    type Request: Serialize + DeserializeOwned + Default + QueryFields + Send + 'static;
    type Response: Serialize + Send + 'static;

    const OPERATION: Operation;
    /// Decode the request body into `Request`.
    const ACCEPTS_BODY: bool;
    /// Populate `Request` from the query string.
    const ACCEPTS_QUERY: bool;

    /// Copy path captures into the request.
    fn bind_captures(req: &mut Self::Request, captures: &[String]) -> Result<(), TranscodeError>;

    /// Call the matching service method.
    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>>;
}

/// Generic transcoder for a release service operation.
pub struct Transcode<R: Rpc> {
    client: Arc<dyn ReleaseService>,
    _rpc: PhantomData<fn() -> R>,
}

impl<R: Rpc> Transcode<R> {
    pub fn new(client: Arc<dyn ReleaseService>) -> Self {
        Self {
            client,
            _rpc: PhantomData,
        }
    }

    /// Build the service request from the inbound pieces.
    pub fn build_request(input: &TranscodeInput) -> Result<R::Request, TranscodeError> {
        let mut req = if R::ACCEPTS_BODY {
            decode_body(&input.body)?
        } else {
            R::Request::default()
        };

        if R::ACCEPTS_QUERY {
            query::populate(&mut req, input.query.as_deref())?;
        }

        R::bind_captures(&mut req, &input.captures)?;
        Ok(req)
    }
}

#[async_trait]
impl<R: Rpc> Transcoder for Transcode<R> {
    async fn transcode(
        &self,
        ctx: &CallContext,
        input: TranscodeInput,
    ) -> Result<Bytes, TranscodeError> {
        let req = Self::build_request(&input)?;

        tracing::debug!(
            request_id = %ctx.request_id(),
            operation = %R::OPERATION,
            "Calling release service"
        );

        let call = R::invoke(self.client.as_ref(), ctx, req);
        let res = match tokio::time::timeout_at(ctx.deadline(), call).await {
            Ok(res) => res?,
            Err(_) => return Err(BackendError::DeadlineExceeded.into()),
        };

        serde_json::to_vec(&res)
            .map(Bytes::from)
            .map_err(TranscodeError::Codec)
    }
}

fn decode_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, TranscodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(TranscodeError::Body)
}

/// Capture at `index`, or an error if the route did not produce it.
pub(crate) fn capture(captures: &[String], index: usize) -> Result<&str, TranscodeError> {
    captures
        .get(index)
        .map(String::as_str)
        .ok_or(TranscodeError::MissingCapture(index))
}
