//! Core types for client session lifecycle and backend synchronization.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionRecord` - The session value held in memory and pushed to the backend
//! - `SessionPatch` - Partial update with metadata merge semantics
//! - `SessionBackend` - Trait for the backend session protocol
//! - `SyncConfig` - Cadence, endpoint and failure policy configuration

pub mod config;
pub mod protocol;
pub mod record;
pub mod traits;

pub use config::{ConfigError, InitFailurePolicy, MAX_SYNC_INTERVAL_SECS, SyncConfig};
pub use protocol::{ClientInfo, InitRequest, InitResponse, SyncRequest};
pub use record::{Modality, Owner, SessionPatch, SessionRecord};
pub use traits::{BackendError, SessionBackend, SessionId};
