//! History feed types
//!
//! The server exposes an append-only change feed per bucket, ordered by
//! descending modification time. Entries are produced by the server and
//! never mutated by the client; snapshot reconstruction replays them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of change recorded by a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Create,
    Update,
    Delete,
}

/// One entry of the append-only history feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    /// Kind of object the entry concerns (`record`, `collection`, ...)
    #[serde(default)]
    pub resource_name: String,
    /// Collection the entry belongs to, when record-scoped
    #[serde(default)]
    pub collection_id: Option<String>,
    /// Modification time of the entry itself, epoch milliseconds
    #[serde(default)]
    pub last_modified: u64,
    pub target: HistoryTarget,
}

/// The state of the changed object as of the entry's event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTarget {
    #[serde(default)]
    pub data: Value,
}

impl HistoryEntry {
    /// Id of the target object, when present.
    pub fn target_id(&self) -> Option<&str> {
        self.target.data.get("id").and_then(Value::as_str)
    }

    /// Modification time of the target object, epoch milliseconds.
    pub fn target_last_modified(&self) -> Option<u64> {
        self.target.data.get("last_modified").and_then(Value::as_u64)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_a_server_entry() {
        let entry: HistoryEntry = serde_json::from_value(json!({
            "action": "update",
            "resource_name": "record",
            "collection_id": "posts",
            "last_modified": 1700000000123u64,
            "target": { "data": { "id": "abc", "last_modified": 1700000000123u64 } }
        }))
        .unwrap();

        assert_eq!(entry.action, HistoryAction::Update);
        assert_eq!(entry.target_id(), Some("abc"));
        assert_eq!(entry.target_last_modified(), Some(1_700_000_000_123));
    }

    #[test]
    fn missing_target_fields_are_tolerated() {
        let entry: HistoryEntry = serde_json::from_value(json!({
            "action": "delete",
            "target": { "data": {} }
        }))
        .unwrap();
        assert_eq!(entry.target_id(), None);
        assert_eq!(entry.target_last_modified(), None);
    }
}
