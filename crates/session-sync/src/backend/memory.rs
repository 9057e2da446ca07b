//! In-memory session backend.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use session_sync_core::{
    BackendError, InitRequest, Owner, SessionBackend, SessionRecord,
};
use uuid::Uuid;

use crate::lock;

/// In-memory backend implementation.
///
/// Useful for development, offline demos and tests. Every init request and
/// every pushed record is kept so callers can inspect what would have gone
/// over the wire. Data is lost on restart.
pub struct MemoryBackend {
    owner: Owner,
    init_latency: Option<Duration>,
    sync_latency: Option<Duration>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    init_requests: Vec<InitRequest>,
    synced: Vec<SessionRecord>,
    sync_attempts: usize,
    init_failure: Option<BackendError>,
    failing_syncs: usize,
}

impl MemoryBackend {
    /// Create a backend that hands out sessions owned by `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self::with_owner(Owner::from(owner.into()))
    }

    /// Create a backend with an explicit owner, including the local sentinel.
    #[must_use]
    pub fn with_owner(owner: Owner) -> Self {
        Self {
            owner,
            init_latency: None,
            sync_latency: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Delay every init response.
    #[must_use]
    pub const fn with_init_latency(mut self, latency: Duration) -> Self {
        self.init_latency = Some(latency);
        self
    }

    /// Delay every sync response.
    #[must_use]
    pub const fn with_sync_latency(mut self, latency: Duration) -> Self {
        self.sync_latency = Some(latency);
        self
    }

    /// Fail every init call with `error` until cleared.
    pub fn fail_init(&self, error: BackendError) {
        lock(&self.state).init_failure = Some(error);
    }

    pub fn clear_init_failure(&self) {
        lock(&self.state).init_failure = None;
    }

    /// Fail the next `count` sync calls.
    pub fn fail_next_syncs(&self, count: usize) {
        lock(&self.state).failing_syncs = count;
    }

    #[must_use]
    pub fn init_requests(&self) -> Vec<InitRequest> {
        lock(&self.state).init_requests.clone()
    }

    /// Records accepted by `sync`, oldest first.
    #[must_use]
    pub fn synced(&self) -> Vec<SessionRecord> {
        lock(&self.state).synced.clone()
    }

    #[must_use]
    pub fn last_synced(&self) -> Option<SessionRecord> {
        lock(&self.state).synced.last().cloned()
    }

    /// Sync calls received, including failed ones.
    #[must_use]
    pub fn sync_attempts(&self) -> usize {
        lock(&self.state).sync_attempts
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("anonymous")
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn init(&self, request: &InitRequest) -> Result<SessionRecord, BackendError> {
        let failure = {
            let mut state = lock(&self.state);
            state.init_requests.push(request.clone());
            state.init_failure.clone()
        };

        if let Some(latency) = self.init_latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(SessionRecord::new(
            Uuid::new_v4().to_string(),
            self.owner.clone(),
            request.current_route.clone(),
        ))
    }

    async fn sync(&self, record: &SessionRecord) -> Result<(), BackendError> {
        let fail = {
            let mut state = lock(&self.state);
            state.sync_attempts += 1;
            if state.failing_syncs > 0 {
                state.failing_syncs -= 1;
                true
            } else {
                false
            }
        };

        if let Some(latency) = self.sync_latency {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(BackendError::Unreachable("simulated network failure".into()));
        }

        lock(&self.state).synced.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn test_init_assigns_owner_and_route() {
        let backend = MemoryBackend::new("user-7");
        let request = InitRequest::new(Default::default(), "/inbox");
        let record = assert_ok!(backend.init(&request).await);

        assert_eq!(record.owner, Owner::User("user-7".into()));
        assert_eq!(record.current_route, "/inbox");
        assert_eq!(backend.init_requests(), vec![request]);
    }

    #[tokio::test]
    async fn test_init_failure_until_cleared() {
        let backend = MemoryBackend::default();
        backend.fail_init(BackendError::Rejected {
            status: 401,
            message: "expired".into(),
        });
        assert_err!(backend.init(&InitRequest::default()).await);

        backend.clear_init_failure();
        assert_ok!(backend.init(&InitRequest::default()).await);
        assert_eq!(backend.init_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_failures_are_counted() {
        let backend = MemoryBackend::default();
        let record = SessionRecord::new("s1", Owner::User("u".into()), "/");
        backend.fail_next_syncs(2);

        assert_err!(backend.sync(&record).await);
        assert_err!(backend.sync(&record).await);
        assert_ok!(backend.sync(&record).await);

        assert_eq!(backend.sync_attempts(), 3);
        assert_eq!(backend.last_synced(), Some(record));
    }
}
