//! # Carton HTTP
//!
//! The impure layer of the Carton client: transport execution over
//! reqwest, the live `Client`, batch recording and flushing, the
//! pagination walker, and the bucket/collection resource accessors.
//!
//! ## Architecture
//! - Implements the orchestration contracts of `carton-core`
//! - Depends on `carton-domain` and `carton-core`
//! - Contains all I/O (network calls, retry sleeps)

pub mod batch;
pub mod bucket;
pub mod client;
pub mod collection;
mod dispatch;
pub mod paginator;
pub mod state;
pub mod transport;

// Re-export commonly used items
pub use batch::{BatchClient, BatchOptions, BatchOutcome};
pub use bucket::Bucket;
pub use client::{Client, ClientBuilder};
pub use collection::Collection;
pub use paginator::PaginatedList;
pub use state::ClientEvent;
pub use transport::Transport;
