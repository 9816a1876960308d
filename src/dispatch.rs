//! Operation dispatch.
//!
//! # Responsibilities
//! - Hold the one-to-one map from operation to transcoder, built at startup
//! - Invoke the transcoder for a resolved, authenticated request
//! - Turn its result into exactly one HTTP response
//!
//! # Design Decisions
//! - Lookup is a single map access; registering two handlers for one
//!   operation is a startup error
//! - Startup also checks that every routed operation has a handler
//! - Handler errors are logged here with their cause; the client only gets a
//!   generic message

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::backend::ReleaseService;
use crate::context::CallContext;
use crate::http::response::GatewayError;
use crate::routing::{Operation, ResolvedRoute, RouteTable};
use crate::transcode::{
    GetRelease, InstallRelease, ListReleases, ReleaseHistory, RollbackRelease, Rpc,
    StatusTranscoder, Transcode, TranscodeInput, Transcoder, UninstallRelease, UpgradeRelease,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler already registered for operation '{0}'")]
    Duplicate(Operation),

    #[error("no handler registered for routed operation '{0}'")]
    Unhandled(Operation),
}

/// Operation → transcoder map.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<Operation, Arc<dyn Transcoder>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        operation: Operation,
        handler: Arc<dyn Transcoder>,
    ) -> Result<(), DispatchError> {
        if self.handlers.contains_key(&operation) {
            return Err(DispatchError::Duplicate(operation));
        }
        self.handlers.insert(operation, handler);
        Ok(())
    }

    /// Handlers for every release API operation, backed by `client`.
    pub fn release_api(client: Arc<dyn ReleaseService>) -> Result<Self, DispatchError> {
        fn rpc<R: Rpc>(client: &Arc<dyn ReleaseService>) -> Arc<dyn Transcoder> {
            Arc::new(Transcode::<R>::new(client.clone()))
        }

        let mut dispatcher = Self::new();
        dispatcher.register(Operation::Status, Arc::new(StatusTranscoder))?;
        dispatcher.register(Operation::List, rpc::<ListReleases>(&client))?;
        dispatcher.register(Operation::Get, rpc::<GetRelease>(&client))?;
        dispatcher.register(Operation::Install, rpc::<InstallRelease>(&client))?;
        dispatcher.register(Operation::Upgrade, rpc::<UpgradeRelease>(&client))?;
        dispatcher.register(Operation::Uninstall, rpc::<UninstallRelease>(&client))?;
        dispatcher.register(Operation::History, rpc::<ReleaseHistory>(&client))?;
        dispatcher.register(Operation::Rollback, rpc::<RollbackRelease>(&client))?;
        Ok(dispatcher)
    }

    /// Fail unless every operation in `routes` has a handler.
    pub fn ensure_covers(&self, routes: &RouteTable) -> Result<(), DispatchError> {
        match routes
            .entries()
            .iter()
            .find(|e| !self.handlers.contains_key(&e.operation))
        {
            Some(entry) => Err(DispatchError::Unhandled(entry.operation)),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `route` and build the response.
    pub async fn dispatch(
        &self,
        route: ResolvedRoute,
        ctx: &CallContext,
        query: Option<String>,
        body: Bytes,
    ) -> Response {
        let operation = route.operation;
        let Some(handler) = self.handlers.get(&operation) else {
            let err = GatewayError::Unhandled(operation);
            tracing::error!(request_id = %ctx.request_id(), error = %err, "Dispatch failed");
            return err.into_response();
        };

        let input = TranscodeInput {
            captures: route.captures,
            query,
            body,
        };

        match handler.transcode(ctx, input).await {
            Ok(json) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
                .into_response(),
            Err(e) => {
                let err = GatewayError::from_transcode(operation, e);
                if err.status_code().is_client_error() {
                    tracing::info!(
                        request_id = %ctx.request_id(),
                        operation = %operation,
                        error = %err,
                        "Rejected request input"
                    );
                } else {
                    tracing::error!(
                        request_id = %ctx.request_id(),
                        operation = %operation,
                        error = %err,
                        "Operation failed"
                    );
                }
                err.into_response()
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut operations: Vec<_> = self.handlers.keys().collect();
        operations.sort();
        f.debug_struct("Dispatcher").field("operations", &operations).finish()
    }
}
