//! Per-operation bindings.
//!
//! | Operation | Body | Query | Captures         | Service method      |
//! |-----------|------|-------|------------------|---------------------|
//! | list      |      | yes   |                  | list_releases       |
//! | get       |      | yes   | name             | get_release_content |
//! | install   | yes  |       |                  | install_release     |
//! | upgrade   | yes  |       | name             | update_release      |
//! | uninstall |      | yes   | name             | uninstall_release   |
//! | history   |      | yes   | name             | get_history         |
//! | rollback  | yes  |       | name, revision   | rollback_release    |
//!
//! `status` never reaches the release service; it reports the API versions
//! this gateway serves.

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::backend::types::*;
use crate::backend::{BackendResult, ReleaseService};
use crate::context::CallContext;
use crate::routing::Operation;
use crate::transcode::query::{FieldKind, QueryField, QueryFields};
use crate::transcode::{capture, Rpc, TranscodeError, TranscodeInput, Transcoder};

impl QueryFields for ListReleasesRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[
        QueryField::new("limit", FieldKind::I64),
        QueryField::new("offset", FieldKind::Str),
        QueryField::new("sort_by", FieldKind::Str),
        QueryField::new("filter", FieldKind::Str),
        QueryField::new("sort_order", FieldKind::Str),
        QueryField::new("status_codes", FieldKind::StrList),
        QueryField::new("namespace", FieldKind::Str),
    ];
}

impl QueryFields for GetReleaseContentRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[QueryField::new("revision", FieldKind::I32)];
}

impl QueryFields for UninstallReleaseRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[
        QueryField::new("disable_hooks", FieldKind::Bool),
        QueryField::new("purge", FieldKind::Bool),
        QueryField::new("timeout", FieldKind::I64),
    ];
}

impl QueryFields for GetHistoryRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[QueryField::new("max", FieldKind::I32)];
}

impl QueryFields for InstallReleaseRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[];
}

impl QueryFields for UpdateReleaseRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[];
}

impl QueryFields for RollbackReleaseRequest {
    const QUERY_FIELDS: &'static [QueryField] = &[];
}

pub struct ListReleases;

impl Rpc for ListReleases {
    type Request = ListReleasesRequest;
    type Response = Reply<ListReleasesResponse>;

    const OPERATION: Operation = Operation::List;
    const ACCEPTS_BODY: bool = false;
    const ACCEPTS_QUERY: bool = true;

    fn bind_captures(_req: &mut Self::Request, _captures: &[String]) -> Result<(), TranscodeError> {
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.list_releases(ctx, req)
    }
}

pub struct GetRelease;

impl Rpc for GetRelease {
    type Request = GetReleaseContentRequest;
    type Response = Reply<GetReleaseContentResponse>;

    const OPERATION: Operation = Operation::Get;
    const ACCEPTS_BODY: bool = false;
    const ACCEPTS_QUERY: bool = true;

    fn bind_captures(req: &mut Self::Request, captures: &[String]) -> Result<(), TranscodeError> {
        req.name = capture(captures, 0)?.to_string();
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.get_release_content(ctx, req)
    }
}

pub struct InstallRelease;

impl Rpc for InstallRelease {
    type Request = InstallReleaseRequest;
    type Response = Reply<InstallReleaseResponse>;

    const OPERATION: Operation = Operation::Install;
    const ACCEPTS_BODY: bool = true;
    const ACCEPTS_QUERY: bool = false;

    fn bind_captures(_req: &mut Self::Request, _captures: &[String]) -> Result<(), TranscodeError> {
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.install_release(ctx, req)
    }
}

pub struct UpgradeRelease;

impl Rpc for UpgradeRelease {
    type Request = UpdateReleaseRequest;
    type Response = Reply<UpdateReleaseResponse>;

    const OPERATION: Operation = Operation::Upgrade;
    const ACCEPTS_BODY: bool = true;
    const ACCEPTS_QUERY: bool = false;

    fn bind_captures(req: &mut Self::Request, captures: &[String]) -> Result<(), TranscodeError> {
        req.name = capture(captures, 0)?.to_string();
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.update_release(ctx, req)
    }
}

pub struct UninstallRelease;

impl Rpc for UninstallRelease {
    type Request = UninstallReleaseRequest;
    type Response = Reply<UninstallReleaseResponse>;

    const OPERATION: Operation = Operation::Uninstall;
    const ACCEPTS_BODY: bool = false;
    const ACCEPTS_QUERY: bool = true;

    fn bind_captures(req: &mut Self::Request, captures: &[String]) -> Result<(), TranscodeError> {
        req.name = capture(captures, 0)?.to_string();
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.uninstall_release(ctx, req)
    }
}

pub struct ReleaseHistory;

impl Rpc for ReleaseHistory {
    type Request = GetHistoryRequest;
    type Response = Reply<GetHistoryResponse>;

    const OPERATION: Operation = Operation::History;
    const ACCEPTS_BODY: bool = false;
    const ACCEPTS_QUERY: bool = true;

    fn bind_captures(req: &mut Self::Request, captures: &[String]) -> Result<(), TranscodeError> {
        req.name = capture(captures, 0)?.to_string();
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.get_history(ctx, req)
    }
}

pub struct RollbackRelease;

impl Rpc for RollbackRelease {
    type Request = RollbackReleaseRequest;
    type Response = Reply<RollbackReleaseResponse>;

    const OPERATION: Operation = Operation::Rollback;
    const ACCEPTS_BODY: bool = true;
    const ACCEPTS_QUERY: bool = false;

    fn bind_captures(req: &mut Self::Request, captures: &[String]) -> Result<(), TranscodeError> {
        req.name = capture(captures, 0)?.to_string();

        let revision = capture(captures, 1)?;
        req.revision = revision.parse().map_err(|_| TranscodeError::Capture {
            name: "revision",
            value: revision.to_string(),
        })?;
        Ok(())
    }

    fn invoke<'a>(
        client: &'a dyn ReleaseService,
        ctx: &'a CallContext,
        req: Self::Request,
    ) -> BoxFuture<'a, BackendResult<Self::Response>> {
        client.rollback_release(ctx, req)
    }
}

/// Body of the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub versions: &'static [&'static str],
}

impl StatusReport {
    pub const CURRENT: StatusReport = StatusReport {
        status: "ok",
        versions: &["v1"],
    };
}

/// Serves the status endpoint without touching the release service.
pub struct StatusTranscoder;

#[async_trait]
impl Transcoder for StatusTranscoder {
    async fn transcode(
        &self,
        _ctx: &CallContext,
        _input: TranscodeInput,
    ) -> Result<Bytes, TranscodeError> {
        serde_json::to_vec(&StatusReport::CURRENT)
            .map(Bytes::from)
            .map_err(TranscodeError::Codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::Transcode;
    use std::time::Duration;

    fn input(captures: &[&str], query: Option<&str>, body: &str) -> TranscodeInput {
        TranscodeInput {
            captures: captures.iter().map(|c| c.to_string()).collect(),
            query: query.map(str::to_string),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_get_binds_name_and_revision() {
        let input = input(&["foo"], Some("revision=2"), "");
        let req = Transcode::<GetRelease>::build_request(&input).unwrap();
        assert_eq!(
            req,
            GetReleaseContentRequest {
                name: "foo".into(),
                revision: 2,
            }
        );
    }

    #[test]
    fn test_read_operations_ignore_body() {
        let input = input(&["foo"], Some("max=5"), "{garbage");
        let req = Transcode::<ReleaseHistory>::build_request(&input).unwrap();
        assert_eq!(req.name, "foo");
        assert_eq!(req.max, 5);
    }

    #[test]
    fn test_list_uses_query() {
        let req = Transcode::<ListReleases>::build_request(&input(
            &[],
            Some("limit=20&namespace=prod&statusCodes=DEPLOYED"),
            "",
        ))
        .unwrap();
        assert_eq!(req.limit, 20);
        assert_eq!(req.namespace, "prod");
        assert_eq!(req.status_codes, vec!["DEPLOYED"]);
    }

    #[test]
    fn test_uninstall_flags() {
        let input = input(&["foo"], Some("purge=true"), "");
        let req = Transcode::<UninstallRelease>::build_request(&input).unwrap();
        assert_eq!(req.name, "foo");
        assert!(req.purge);
        assert!(!req.disable_hooks);
    }

    #[test]
    fn test_install_decodes_body() {
        let req = Transcode::<InstallRelease>::build_request(&input(
            &[],
            Some("dry_run=true"),
            concat!(
                r#"{"name":"web","namespace":"prod","#,
                r#""chart":{"metadata":{"name":"nginx"}},"values":{"raw":"a: 1"}}"#
            ),
        ))
        .unwrap();
        assert_eq!(req.name, "web");
        assert_eq!(req.namespace, "prod");
        assert_eq!(req.values.unwrap().raw, "a: 1");
        // Install takes no query parameters
        assert!(!req.dry_run);
    }

    #[test]
    fn test_upgrade_capture_overrides_body_name() {
        let req = Transcode::<UpgradeRelease>::build_request(&input(
            &["from-path"],
            None,
            r#"{"name":"from-body","force":true}"#,
        ))
        .unwrap();
        assert_eq!(req.name, "from-path");
        assert!(req.force);
    }

    #[test]
    fn test_malformed_body_rejected() {
        let input = input(&["foo"], None, "{\"force\":");
        let err = Transcode::<UpgradeRelease>::build_request(&input).unwrap_err();
        assert!(matches!(err, TranscodeError::Body(_)));
    }

    #[test]
    fn test_rollback_revision() {
        let valid = input(&["myapp", "3"], None, r#"{"wait":true}"#);
        let req = Transcode::<RollbackRelease>::build_request(&valid).unwrap();
        assert_eq!(req.name, "myapp");
        assert_eq!(req.revision, 3);
        assert!(req.wait);

        let invalid = input(&["myapp", "three"], None, "");
        let err = Transcode::<RollbackRelease>::build_request(&invalid).unwrap_err();
        assert!(matches!(err, TranscodeError::Capture { name: "revision", .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_missing_capture_is_internal() {
        let err = Transcode::<GetRelease>::build_request(&input(&[], None, "")).unwrap_err();
        assert!(matches!(err, TranscodeError::MissingCapture(0)));
    }

    #[tokio::test]
    async fn test_status_report() {
        let ctx = CallContext::new("status", Duration::from_secs(1));
        let body = StatusTranscoder.transcode(&ctx, TranscodeInput::default()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "status": "ok", "versions": ["v1"] }));
    }
}
