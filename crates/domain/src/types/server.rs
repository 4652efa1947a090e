//! Server metadata types
//!
//! The root endpoint (`GET /`) describes the server: advertised settings
//! (batch limits) and capabilities. The client fetches this once and caches
//! it until its headers are reconfigured.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response body of the root endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub project_version: Option<String>,
    #[serde(default)]
    pub http_api_version: Option<String>,
    #[serde(default)]
    pub settings: ServerSettings,
    /// Capability name -> arbitrary descriptor
    #[serde(default)]
    pub capabilities: BTreeMap<String, Value>,
}

/// Server-advertised operational settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Maximum number of sub-requests per batch call. Absent or zero
    /// means the server imposes no limit.
    #[serde(default)]
    pub batch_max_requests: Option<u64>,
    #[serde(default)]
    pub readonly: bool,
}

impl ServerSettings {
    /// Effective chunk limit: `None` when the server imposes no bound.
    pub fn chunk_limit(&self) -> Option<usize> {
        match self.batch_max_requests {
            Some(0) | None => None,
            Some(n) => usize::try_from(n).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_root_endpoint_body() {
        let info: ServerInfo = serde_json::from_value(json!({
            "project_name": "storage",
            "settings": { "batch_max_requests": 25, "readonly": false },
            "capabilities": { "history": { "description": "track changes" } }
        }))
        .unwrap();

        assert_eq!(info.settings.chunk_limit(), Some(25));
        assert!(info.capabilities.contains_key("history"));
    }

    #[test]
    fn absent_or_zero_limit_means_unbounded() {
        assert_eq!(ServerSettings::default().chunk_limit(), None);
        let zero = ServerSettings { batch_max_requests: Some(0), readonly: false };
        assert_eq!(zero.chunk_limit(), None);
    }
}
