//! Consumer-facing access to the current session.

use std::sync::Arc;

use session_sync_core::{SessionPatch, SessionRecord};
use tokio::sync::watch;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not started, or shut down.
    #[default]
    Idle,
    /// Unauthenticated; a local-only record is installed.
    Local,
    /// Waiting for the backend to hand out a session.
    Initializing,
    /// Backend session installed and the sync loop is running.
    Synced,
    /// Backend init failed; running on a local-only record.
    Degraded { reason: String },
    /// Backend init failed and no record was installed.
    Failed { reason: String },
}

impl SessionStatus {
    /// True once a record is installed and usable.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Local | Self::Synced | Self::Degraded { .. })
    }

    /// True once the current activation has finished its entry steps,
    /// successfully or not.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.is_ready() || matches!(self, Self::Failed { .. })
    }
}

/// The current record and status, always published together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub session: Option<SessionRecord>,
    pub status: SessionStatus,
}

impl SessionSnapshot {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.status.is_ready()
    }
}

/// Read/update access point for the rest of the application.
///
/// Cheap to clone. Reads never block on the backend and updates are visible
/// to the next sync tick immediately.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionHandle {
    pub(crate) const fn new(state: Arc<watch::Sender<SessionSnapshot>>) -> Self {
        Self { state }
    }

    /// The current record, or `None` before the first one is produced.
    #[must_use]
    pub fn session(&self) -> Option<SessionRecord> {
        self.state.borrow().session.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Apply a partial update to the current record.
    ///
    /// Returns `false` and changes nothing when no record is installed.
    pub fn update_session(&self, patch: SessionPatch) -> bool {
        let mut present = false;
        self.state.send_if_modified(|snapshot| {
            let Some(record) = snapshot.session.as_mut() else {
                return false;
            };
            present = true;
            if patch.is_empty() {
                return false;
            }
            record.apply(patch);
            true
        });

        if !present {
            tracing::debug!("session update ignored: no active session");
        }
        present
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Wait until a record is installed.
    ///
    /// Never resolves if initialization fails closed; use
    /// [`SessionHandle::wait_settled`] to observe that case.
    pub async fn wait_ready(&self) -> SessionSnapshot {
        self.wait_for(SessionSnapshot::is_ready).await
    }

    /// Wait until the current activation is ready or has failed.
    pub async fn wait_settled(&self) -> SessionSnapshot {
        self.wait_for(|snapshot| snapshot.status.is_settled()).await
    }

    async fn wait_for(&self, predicate: impl FnMut(&SessionSnapshot) -> bool) -> SessionSnapshot {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        match rx.wait_for(predicate).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("snapshot", &*self.state.borrow())
            .finish()
    }
}
