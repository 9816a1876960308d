//! Release service schema.
//!
//! Request and response messages exchanged with the release service. Field
//! names are snake_case and empty values are omitted on output.
//!
//! Answers travel as [`Reply`], which keeps the exact JSON text the service
//! sent. The typed response structs describe that payload and are reached
//! through `Reply::decode`; relaying never goes through them.

use std::fmt;
use std::marker::PhantomData;

use axum::body::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use thiserror::Error;

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Errors returned by a release service call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service could not be reached or the connection failed mid-call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("release service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The call did not finish before the request deadline.
    #[error("release service call exceeded the request deadline")]
    DeadlineExceeded,

    /// Request or response payload could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Result type for release service calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// A release service answer held as the exact JSON text the service sent.
///
/// `T` names the schema of the payload. Serializing a `Reply` writes the
/// original text unchanged, including fields `T` does not declare.
pub struct Reply<T> {
    raw: Box<RawValue>,
    _schema: PhantomData<fn() -> T>,
}

impl<T> Reply<T> {
    pub fn from_raw(raw: Box<RawValue>) -> Self {
        Self {
            raw,
            _schema: PhantomData,
        }
    }

    /// Wrap JSON text. Fails if `text` is not a single JSON value.
    pub fn from_json(text: impl Into<String>) -> Result<Self, serde_json::Error> {
        RawValue::from_string(text.into()).map(Self::from_raw)
    }

    pub fn as_str(&self) -> &str {
        self.raw.get()
    }

    pub fn into_bytes(self) -> Bytes {
        let text: Box<str> = self.raw.into();
        Bytes::from(String::from(text))
    }
}

impl<T: Serialize> Reply<T> {
    /// Build a reply from a typed value.
    pub fn encode(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self::from_raw)
    }
}

impl<T: DeserializeOwned> Reply<T> {
    /// Typed view of the payload.
    pub fn decode(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.raw.get())
    }
}

impl<T> Clone for Reply<T> {
    fn clone(&self) -> Self {
        Self::from_raw(self.raw.clone())
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reply").field(&self.raw.get()).finish()
    }
}

impl<T> PartialEq for Reply<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<T> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Reply<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Box::<RawValue>::deserialize(deserializer).map(Self::from_raw)
    }
}

/// Point in time as seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timestamp {
    #[serde(skip_serializing_if = "is_default")]
    pub seconds: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub nanos: i32,
}

/// Release status code and notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    /// Status code, as an enum name (`"DEPLOYED"`) or its number.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub code: Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Release lifecycle information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_deployed: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_deployed: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Timestamp>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Supplied configuration values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw: String,
}

/// A release: a chart installed with a particular configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Release {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,
    /// Chart metadata and templates, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub manifest: String,
    #[serde(skip_serializing_if = "is_default")]
    pub version: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListReleasesRequest {
    #[serde(skip_serializing_if = "is_default")]
    pub limit: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub offset: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sort_by: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sort_order: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status_codes: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListReleasesResponse {
    #[serde(skip_serializing_if = "is_default")]
    pub count: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next: String,
    #[serde(skip_serializing_if = "is_default")]
    pub total: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetReleaseContentRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Release revision; zero selects the latest.
    #[serde(skip_serializing_if = "is_default")]
    pub revision: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetReleaseContentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallReleaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Config>,
    #[serde(skip_serializing_if = "is_default")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub disable_hooks: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub replace: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub timeout: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub wait: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "is_default")]
    pub reuse_name: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallReleaseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateReleaseRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Config>,
    #[serde(skip_serializing_if = "is_default")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub disable_hooks: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub recreate: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub timeout: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub reset_values: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub wait: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub reuse_values: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateReleaseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UninstallReleaseRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub disable_hooks: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub purge: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub timeout: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UninstallReleaseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
    /// Notes for resources kept after uninstall.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetHistoryRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Maximum number of revisions to return.
    #[serde(skip_serializing_if = "is_default")]
    pub max: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetHistoryResponse {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackReleaseRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_default")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub disable_hooks: bool,
    /// Revision to roll back to.
    #[serde(skip_serializing_if = "is_default")]
    pub revision: i32,
    #[serde(skip_serializing_if = "is_default")]
    pub recreate: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub timeout: i64,
    #[serde(skip_serializing_if = "is_default")]
    pub wait: bool,
    #[serde(skip_serializing_if = "is_default")]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackReleaseResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_schema_decodes_service_payload() {
        let wire = json!({
            "release": {
                "name": "myapp",
                "info": {
                    "status": { "code": "DEPLOYED" },
                    "last_deployed": { "seconds": 1700000000 },
                    "description": "Install complete"
                },
                "chart": { "metadata": { "name": "nginx", "version": "1.2.3" } },
                "config": { "raw": "replicas: 2\n" },
                "manifest": "---\nkind: Deployment\n",
                "version": 3,
                "namespace": "default",
                "hooks": [{ "name": "pre-install-job" }]
            }
        });

        let decoded: GetReleaseContentResponse = serde_json::from_value(wire.clone()).unwrap();
        let release = decoded.release.as_ref().unwrap();
        assert_eq!(release.version, 3);
        assert!(release.extra.contains_key("hooks"));

        assert_eq!(serde_json::to_value(&decoded).unwrap(), wire);
    }

    #[test]
    fn test_reply_keeps_exact_text() {
        let text = concat!(
            r#"{"warnings":["chart deprecated"],"release":{"name":"foo","#,
            r#""info":{"status":{"code":1,"resources":"po/foo-1 Running"}}}}"#
        );
        let reply: Reply<GetReleaseContentResponse> = serde_json::from_str(text).unwrap();

        assert_eq!(reply.as_str(), text);
        assert_eq!(serde_json::to_string(&reply).unwrap(), text);
        assert_eq!(&reply.clone().into_bytes()[..], text.as_bytes());

        let decoded = reply.decode().unwrap();
        let status = decoded.release.unwrap().info.unwrap().status.unwrap();
        assert_eq!(status.code, json!(1));
    }

    #[test]
    fn test_reply_encode() {
        let reply = Reply::encode(&GetHistoryResponse::default()).unwrap();
        assert_eq!(reply.as_str(), "{}");
        assert!(Reply::<GetHistoryResponse>::from_json("{\"a\":1} trailing").is_err());
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let req = GetReleaseContentRequest {
            name: "foo".into(),
            revision: 0,
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({ "name": "foo" }));
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Status {
            status: 404,
            message: "release: \"foo\" not found".into(),
        };
        assert!(err.to_string().contains("404"));
        assert_eq!(
            BackendError::DeadlineExceeded.to_string(),
            "release service call exceeded the request deadline"
        );
    }
}
