//! Wire request/response types
//!
//! Requests and responses are described as plain data: the transport layer
//! executes `WireRequest` values and produces `WireResponse` values, and the
//! batch endpoint ships `WireRequest` lists inside a `BatchEnvelope`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// One logical mutation or read, immutable once built.
///
/// `path` is relative to the server root unless it is an absolute URL (the
/// opaque `Next-Page` links are absolute and must be followed verbatim).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl WireRequest {
    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy of this request with the `Authorization` value replaced, safe
    /// to carry inside errors and log output.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for (name, value) in &mut copy.headers {
            if name.eq_ignore_ascii_case("authorization") {
                *value = "**** (suppressed)".to_string();
            }
        }
        copy
    }
}

/// A normalized HTTP response: status, headers, and JSON body.
///
/// `body` is `None` when the payload was empty or not JSON (tracked via
/// `Content-Length`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl WireResponse {
    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Body of the outer `POST /batch` call.
///
/// Invariant: `requests.len()` never exceeds the server-advertised
/// `batch_max_requests` setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub defaults: BatchDefaults,
    pub requests: Vec<WireRequest>,
}

/// Defaults applied by the server to every sub-request of an envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDefaults {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// One element of the server's batch reply.
///
/// Correlation with the original sub-request is positional; there is no
/// explicit request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResponse {
    pub status: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub body: Value,
}

/// Permission principals by access level (`read`, `write`, ...).
pub type Permissions = BTreeMap<String, Vec<String>>;

/// The `{ data, permissions }` body wrapping every stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectBody {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Four-way classification of a batch's sub-responses.
///
/// Every (request, sub-response) pair lands in exactly one bucket, in
/// input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    /// Sub-requests accepted by the server (2xx), body `data` surfaced.
    pub published: Vec<Value>,
    /// Sub-requests rejected with 412, with the server's conflicting
    /// version surfaced verbatim.
    pub conflicts: Vec<ConflictEntry>,
    /// Expected, recoverable non-2xx outcomes (e.g. 404 on a delete).
    pub skipped: Vec<SkippedEntry>,
    /// Server faults (>= 500) and unexpected statuses.
    pub errors: Vec<ErrorEntry>,
}

/// A 412 outcome: the version we sent against the version the server holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictEntry {
    pub path: String,
    /// What the client attempted to write
    pub local: Value,
    /// The server's current version of the object, possibly `null` when
    /// the server omitted detail
    pub remote: Value,
}

/// A non-2xx, non-412, non-5xx outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub path: String,
    pub error: Value,
}

/// A failed sub-request, paired with what was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEntry {
    pub path: String,
    pub sent: WireRequest,
    pub error: Value,
}
