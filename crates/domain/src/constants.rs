//! Domain constants
//!
//! Centralized location for header names, query parameter names, and
//! client defaults shared across the workspace.

// Pagination signal headers
pub const HEADER_NEXT_PAGE: &str = "Next-Page";
pub const HEADER_ETAG: &str = "ETag";
pub const HEADER_TOTAL_RECORDS: &str = "Total-Records";

// Server backpressure headers
pub const HEADER_BACKOFF: &str = "Backoff";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";
pub const HEADER_ALERT: &str = "Alert";

// Concurrency control headers
pub const HEADER_IF_MATCH: &str = "If-Match";
pub const HEADER_IF_NONE_MATCH: &str = "If-None-Match";

// Query parameters understood by list endpoints
pub const PARAM_SORT: &str = "_sort";
pub const PARAM_LIMIT: &str = "_limit";
pub const PARAM_SINCE: &str = "_since";
pub const PARAM_FIELDS: &str = "_fields";

/// Default sort order for list endpoints (newest first).
pub const DEFAULT_SORT: &str = "-last_modified";

/// Default transport timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Capability name guarding history/snapshot operations.
pub const CAPABILITY_HISTORY: &str = "history";
