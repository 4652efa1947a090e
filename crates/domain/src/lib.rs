//! # Carton Domain
//!
//! Wire-level types and error taxonomy for the Carton client.
//!
//! This crate contains:
//! - Wire request/response/batch envelope types
//! - History feed and server metadata types
//! - The `CartonError` taxonomy and `Result` alias
//! - Domain constants (header names, defaults)
//!
//! ## Architecture
//! - No dependencies on other Carton crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{CartonError, Result};
pub use types::*;
