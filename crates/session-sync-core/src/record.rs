//! Session record and partial updates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::SessionId;

/// Metadata key set on every local-only record.
pub const LOCAL_ONLY_KEY: &str = "local_only";

/// Sentinel owner string for sessions that never reach a backend.
const LOCAL_OWNER: &str = "local";

/// Who a session belongs to.
///
/// Serialized as a plain string; `"local"` is reserved for local-only sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    /// Unauthenticated, never synchronized.
    Local,
    /// Authenticated user identifier assigned by the backend.
    User(String),
}

impl Owner {
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl From<String> for Owner {
    fn from(value: String) -> Self {
        if value == LOCAL_OWNER {
            Self::Local
        } else {
            Self::User(value)
        }
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Local => LOCAL_OWNER.to_string(),
            Owner::User(user) => user,
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str(LOCAL_OWNER),
            Self::User(user) => f.write_str(user),
        }
    }
}

/// Interaction mode the user is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    #[default]
    Text,
    Voice,
    Avatar,
}

/// The user's current activity context.
///
/// `id`, `owner` and `started_at` are fixed at creation. Everything else is
/// changed through [`SessionRecord::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub owner: Owner,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_route: String,
    #[serde(default)]
    pub active_modality: Modality,
    #[serde(default)]
    pub conversation_thread: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl SessionRecord {
    /// Create a fresh record starting now.
    #[must_use]
    pub fn new(id: impl Into<SessionId>, owner: Owner, current_route: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner,
            started_at: Utc::now(),
            ended_at: None,
            current_route: current_route.into(),
            active_modality: Modality::Text,
            conversation_thread: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Fabricate a local-only record for an unauthenticated client.
    #[must_use]
    pub fn local(current_route: impl Into<String>) -> Self {
        let mut record = Self::new(Uuid::new_v4().to_string(), Owner::Local, current_route);
        record.set_metadata(LOCAL_ONLY_KEY, Value::Bool(true));
        record
    }

    /// Whether this record must stay on the client.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.owner.is_local()
    }

    /// Get a metadata value by key.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Apply a partial update.
    ///
    /// Metadata keys are merged into the existing map; every other supplied
    /// field replaces the current value.
    pub fn apply(&mut self, patch: SessionPatch) {
        let SessionPatch {
            current_route,
            active_modality,
            conversation_thread,
            ended_at,
            metadata,
        } = patch;

        if let Some(route) = current_route {
            self.current_route = route;
        }
        if let Some(modality) = active_modality {
            self.active_modality = modality;
        }
        if let Some(thread) = conversation_thread {
            self.conversation_thread = thread;
        }
        if let Some(ended_at) = ended_at {
            self.ended_at = Some(ended_at);
        }
        self.metadata.extend(metadata);
    }
}

/// Partial update to a [`SessionRecord`].
///
/// Identity fields are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_modality: Option<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_thread: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl SessionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.current_route = Some(route.into());
        self
    }

    #[must_use]
    pub const fn modality(mut self, modality: Modality) -> Self {
        self.active_modality = Some(modality);
        self
    }

    #[must_use]
    pub fn thread<I>(mut self, thread: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.conversation_thread = Some(thread.into_iter().map(Into::into).collect());
        self
    }

    /// Mark the session as ended at the given instant.
    #[must_use]
    pub const fn ended(mut self, at: DateTime<Utc>) -> Self {
        self.ended_at = Some(at);
        self
    }

    /// Add one metadata key to merge.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True when applying this patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_route.is_none()
            && self.active_modality.is_none()
            && self.conversation_thread.is_none()
            && self.ended_at.is_none()
            && self.metadata.is_empty()
    }
}
