//! Optimistic-concurrency header derivation
//!
//! "Safe" operations are guarded with conditional HTTP headers derived from
//! the last-known version token of the target object. The token is a
//! monotonically increasing integer, serialized as a quoted string.

use std::collections::BTreeMap;

use carton_domain::constants::{HEADER_IF_MATCH, HEADER_IF_NONE_MATCH};

/// Derive the conditional headers for an operation.
///
/// - `safe = false`: no extra headers, the write is unconditional.
/// - `safe = true`, no token: `If-None-Match: *` — fail if the object
///   already exists.
/// - `safe = true`, token present: `If-Match: "<token>"` — fail if the
///   object's current version differs.
pub fn concurrency_headers(safe: bool, last_modified: Option<u64>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if !safe {
        return headers;
    }
    match last_modified {
        Some(token) => {
            headers.insert(HEADER_IF_MATCH.to_string(), format!("\"{token}\""));
        }
        None => {
            headers.insert(HEADER_IF_NONE_MATCH.to_string(), "*".to_string());
        }
    }
    headers
}
