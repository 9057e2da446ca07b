//! Session lifecycle orchestration and periodic backend sync.
//!
//! Provides:
//! - `SessionManager` - Backend handshake and the recurring sync loop
//! - `SessionOrchestrator` - Local-only vs. backend lifecycle with race-safe init
//! - `SessionHandle` - Read/update access point for the rest of the app
//! - Backend implementations (memory, HTTP)

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod backend;
pub mod handle;
pub mod manager;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use handle::{SessionHandle, SessionSnapshot, SessionStatus};
pub use manager::{ManagerError, SessionManager, SyncHandle, SyncStats};
pub use orchestrator::{RouteProvider, SessionOrchestrator, SessionOrchestratorBuilder};
pub use session_sync_core::*;

/// Lock a std mutex, recovering the guard if a holder panicked.
///
/// Every critical section in this crate leaves the guarded value consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
