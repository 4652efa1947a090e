//! Pagination query building and signal-header parsing
//!
//! List endpoints take `_sort` / `_limit` / `_since` / `_fields` plus
//! verbatim filter passthrough, and answer with `Next-Page` / `ETag` /
//! `Total-Records` headers. The `Next-Page` URL is opaque and must be
//! followed literally, never reconstructed from filters.

use std::collections::BTreeMap;

use carton_domain::constants::{
    DEFAULT_SORT, HEADER_ETAG, HEADER_NEXT_PAGE, HEADER_TOTAL_RECORDS, PARAM_FIELDS, PARAM_LIMIT,
    PARAM_SINCE, PARAM_SORT,
};
use carton_domain::{CartonError, Result, WireResponse};
use serde_json::Value;

/// How many pages a list call may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pages {
    /// Follow `Next-Page` links up to this many pages in total.
    Exactly(u32),
    /// Follow `Next-Page` links until the server reports no more.
    All,
}

/// Per-call options for list operations.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Sort order; defaults to `-last_modified` (newest first).
    pub sort: Option<String>,
    /// Page size hint for the server.
    pub limit: Option<u64>,
    /// Only entries modified after this ETag value. Must be a string; the
    /// token is opaque and comparing it numerically is a caller error.
    pub since: Option<Value>,
    /// Field projection.
    pub fields: Vec<String>,
    /// Additional filters passed through verbatim (e.g. `min_x`, `not_y`).
    pub filters: BTreeMap<String, String>,
    /// Multi-page aggregation; unset means a single page.
    pub pages: Option<Pages>,
    /// Per-call headers; win over resource defaults on conflicts.
    pub headers: BTreeMap<String, String>,
    /// Per-call retry budget override for the transport.
    pub retry: Option<u32>,
}

/// Pagination signals read from a list response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInfo {
    /// Opaque absolute URL of the next page, when any.
    pub next_page: Option<String>,
    /// Collection ETag with surrounding quotes stripped.
    pub etag: Option<String>,
    /// Total record count, only present on HEAD responses.
    pub total_records: Option<u64>,
}

/// Build the query string pairs for a list call.
///
/// Fails fast with a validation error, before any network call, when
/// `since` is not a string.
pub fn build_query(options: &ListOptions) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();

    let sort = options.sort.clone().unwrap_or_else(|| DEFAULT_SORT.to_string());
    pairs.push((PARAM_SORT.to_string(), sort));

    if let Some(limit) = options.limit {
        pairs.push((PARAM_LIMIT.to_string(), limit.to_string()));
    }

    if let Some(since) = &options.since {
        match since {
            Value::String(etag) => pairs.push((PARAM_SINCE.to_string(), etag.clone())),
            other => {
                return Err(CartonError::Validation(format!(
                    "invalid value for since ({other}), should be a string"
                )));
            }
        }
    }

    if !options.fields.is_empty() {
        pairs.push((PARAM_FIELDS.to_string(), options.fields.join(",")));
    }

    for (name, value) in &options.filters {
        pairs.push((name.clone(), value.clone()));
    }

    Ok(pairs)
}

/// Read the pagination signal headers off a list response.
pub fn parse_page_headers(response: &WireResponse) -> PageInfo {
    PageInfo {
        next_page: response.header(HEADER_NEXT_PAGE).map(str::to_string),
        etag: response.header(HEADER_ETAG).map(strip_quotes),
        total_records: response
            .header(HEADER_TOTAL_RECORDS)
            .and_then(|raw| raw.trim().parse().ok()),
    }
}

/// ETags are opaque but stored unquoted for comparison convenience.
fn strip_quotes(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}
