//! Error types used throughout the client

use thiserror::Error;

use crate::types::WireRequest;

/// Main error type for Carton
#[derive(Error, Debug)]
pub enum CartonError {
    /// The transport deadline was exceeded. Carries the request (with the
    /// `Authorization` header value redacted) for diagnostics.
    #[error("request timed out: {} {}", request.method, request.path)]
    NetworkTimeout {
        /// Redacted copy of the request that timed out
        request: WireRequest,
    },

    /// The response body claimed to be JSON but failed to parse.
    #[error("unparseable response body: {reason}")]
    UnparseableResponse {
        /// Raw response text as received
        raw: String,
        /// The underlying parse error, stringified
        reason: String,
    },

    /// The server answered with status >= 400.
    #[error("server returned {status}: {data}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Parsed JSON error body, `null` when the body was empty
        data: serde_json::Value,
    },

    /// Connection-level failure (DNS, refused connection, broken pipe).
    #[error("network error: {0}")]
    Network(String),

    /// Caller passed a malformed argument; raised before any network call.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// A safe write/delete was requested without a resolvable version
    /// token; raised before any network call.
    #[error("precondition not satisfiable: {0}")]
    Precondition(String),

    /// `next()` was called on a cursor with no further pages.
    #[error("pagination exhausted: no next page available")]
    PaginationExhausted,

    /// A snapshot was requested but the history feed does not cover the
    /// collection's creation.
    #[error("history feed is incomplete: cannot reconstruct snapshot")]
    IncompleteHistory,

    /// The server does not advertise a capability the operation requires.
    #[error("server does not support the {0} capability")]
    MissingCapability(String),

    /// Client construction or configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for Carton operations
pub type Result<T> = std::result::Result<T, CartonError>;
