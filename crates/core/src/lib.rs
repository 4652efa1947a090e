//! # Carton Core
//!
//! Pure request-orchestration logic for the Carton client.
//!
//! This crate contains:
//! - Concurrency header derivation (`If-Match` / `If-None-Match`)
//! - Wire request building for create/update/delete operations
//! - Batch chunking, reply alignment, and aggregate classification
//! - Pagination query building and signal-header parsing
//! - Snapshot reconstruction from the history feed
//!
//! ## Architecture
//! - Depends only on `carton-domain`
//! - No network I/O; everything here is deterministic and unit-testable
//!   against literal fixtures

pub mod batch;
pub mod concurrency;
pub mod endpoints;
pub mod pagination;
pub mod request;
pub mod snapshot;
