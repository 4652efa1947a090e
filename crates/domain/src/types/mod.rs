//! Domain data types
//!
//! Plain serde structs describing the wire protocol, the server's history
//! feed, and server metadata. All fields use owned types so values can be
//! queued, cloned, and replayed freely.

pub mod history;
pub mod server;
pub mod wire;

pub use history::{HistoryAction, HistoryEntry, HistoryTarget};
pub use server::{ServerInfo, ServerSettings};
pub use wire::{
    AggregateResult, BatchDefaults, BatchEnvelope, ConflictEntry, ErrorEntry, HttpMethod,
    ObjectBody, Permissions, SkippedEntry, SubResponse, WireRequest, WireResponse,
};
