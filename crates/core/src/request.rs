//! Wire request building
//!
//! Turns a (path, data, permissions, options) tuple into an immutable
//! `WireRequest`, deciding the HTTP verb, merging per-call headers over
//! per-resource defaults, and applying the concurrency header policy.
//! Safe deletes without a resolvable version token fail fast here, before
//! any network call.

use std::collections::BTreeMap;

use carton_domain::{CartonError, HttpMethod, Permissions, Result, WireRequest};
use serde_json::{json, Map, Value};

use crate::concurrency::concurrency_headers;

/// Per-call options for write operations.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Enforce optimistic concurrency via conditional headers.
    pub safe: bool,
    /// Last-known version token of the target object.
    pub last_modified: Option<u64>,
    /// Use PATCH instead of PUT for updates.
    pub patch: bool,
    /// Per-call headers; win over resource defaults on conflicts.
    pub headers: BTreeMap<String, String>,
    /// Per-call retry budget override for the transport.
    pub retry: Option<u32>,
}

impl WriteOptions {
    /// Safe-mode options with a known version token.
    pub fn safe_with(last_modified: u64) -> Self {
        Self { safe: true, last_modified: Some(last_modified), ..Self::default() }
    }
}

/// Per-call options for read operations.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Per-call headers; win over resource defaults on conflicts.
    pub headers: BTreeMap<String, String>,
    /// Per-call retry budget override for the transport.
    pub retry: Option<u32>,
}

/// Merge override headers over defaults; overrides win on conflicts.
pub fn merge_headers(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut headers = defaults.clone();
    for (name, value) in overrides {
        headers.insert(name.clone(), value.clone());
    }
    headers
}

/// Build a creation request.
///
/// POST to the plural endpoint when the data carries no `id`; PUT to the
/// object endpoint when it does (an unsafe POST with an explicit id is not
/// guaranteed idempotent by the server).
pub fn create_request(
    plural_path: &str,
    data: &Value,
    permissions: Option<&Permissions>,
    defaults: &BTreeMap<String, String>,
    options: &WriteOptions,
) -> Result<WireRequest> {
    let id = match data.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id.clone()),
        Some(other) => {
            return Err(CartonError::Validation(format!(
                "object id must be a string, got {other}"
            )));
        }
    };

    let (method, path) = match id {
        Some(id) => (HttpMethod::Put, format!("{plural_path}/{id}")),
        None => (HttpMethod::Post, plural_path.to_string()),
    };

    let mut body = Map::new();
    body.insert("data".to_string(), data.clone());
    if let Some(permissions) = permissions {
        body.insert("permissions".to_string(), json!(permissions));
    }

    let mut headers = merged_headers(defaults, options);
    headers.extend(concurrency_headers(options.safe, options.last_modified));

    Ok(WireRequest { method, path, headers, body: Some(Value::Object(body)) })
}

/// Build an update request.
///
/// PUT by default, PATCH when `options.patch` is set. The version token is
/// taken from the options first, then from the target data. When, after
/// excluding `id` and `last_modified`, the data carries nothing to send and
/// no permissions are attached, the body is omitted entirely to avoid an
/// accidental overwrite with an empty object.
pub fn update_request(
    object_path: &str,
    data: &Value,
    permissions: Option<&Permissions>,
    defaults: &BTreeMap<String, String>,
    options: &WriteOptions,
) -> Result<WireRequest> {
    let token = options.last_modified.or_else(|| version_of(data));
    let method = if options.patch { HttpMethod::Patch } else { HttpMethod::Put };

    let mut headers = merged_headers(defaults, options);
    headers.extend(concurrency_headers(options.safe, token));

    let mut body = Map::new();
    if has_payload(data) {
        body.insert("data".to_string(), data.clone());
    }
    if let Some(permissions) = permissions {
        body.insert("permissions".to_string(), json!(permissions));
    }

    Ok(WireRequest {
        method,
        path: object_path.to_string(),
        headers,
        body: if body.is_empty() { None } else { Some(Value::Object(body)) },
    })
}

/// Build a deletion request.
///
/// When `safe` is requested, a version token must be resolvable from the
/// options or from the target data; otherwise the operation fails fast
/// with a precondition error rather than sending an unconditional delete.
pub fn delete_request(
    object_path: &str,
    data: Option<&Value>,
    defaults: &BTreeMap<String, String>,
    options: &WriteOptions,
) -> Result<WireRequest> {
    let token = options.last_modified.or_else(|| data.and_then(version_of));
    if options.safe && token.is_none() {
        return Err(CartonError::Precondition(format!(
            "safe delete of {object_path} requires a last_modified version token"
        )));
    }

    let mut headers = merged_headers(defaults, options);
    headers.extend(concurrency_headers(options.safe, token));

    Ok(WireRequest { method: HttpMethod::Delete, path: object_path.to_string(), headers, body: None })
}

fn merged_headers(
    defaults: &BTreeMap<String, String>,
    options: &WriteOptions,
) -> BTreeMap<String, String> {
    merge_headers(defaults, &options.headers)
}

/// Extract the version token carried by an object, when any.
fn version_of(data: &Value) -> Option<u64> {
    data.get("last_modified").and_then(Value::as_u64)
}

/// Whether the data still carries anything once `id` and `last_modified`
/// are excluded.
fn has_payload(data: &Value) -> bool {
    match data.as_object() {
        Some(map) => map.keys().any(|k| k != "id" && k != "last_modified"),
        None => !data.is_null(),
    }
}
