//! Wire protocol for the backend session endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SessionRecord;

/// Identifies the client making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of `POST /session/init`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitRequest {
    pub client: ClientInfo,
    /// Navigation location at the time of the request.
    pub current_route: String,
    /// Arbitrary client context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, Value>,
}

impl InitRequest {
    #[must_use]
    pub fn new(client: ClientInfo, current_route: impl Into<String>) -> Self {
        Self {
            client,
            current_route: current_route.into(),
            context: HashMap::new(),
        }
    }

    /// Add a context value.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Response of `POST /session/init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitResponse {
    pub session: SessionRecord,
}

/// Body of `POST /session/sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub session: SessionRecord,
}
