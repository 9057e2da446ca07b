//! Test backends.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use session_sync_core::{BackendError, InitRequest, SessionBackend, SessionRecord};
use tokio::sync::Notify;

use crate::backend::MemoryBackend;

/// Backend whose `init` blocks until [`GatedBackend::release`] is called.
pub struct GatedBackend {
    inner: MemoryBackend,
    gate: Notify,
    init_started: AtomicUsize,
}

impl GatedBackend {
    pub fn new(owner: &str) -> Self {
        Self {
            inner: MemoryBackend::new(owner),
            gate: Notify::new(),
            init_started: AtomicUsize::new(0),
        }
    }

    /// Let one pending (or the next) init call through.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn init_started(&self) -> usize {
        self.init_started.load(Ordering::SeqCst)
    }

    pub const fn inner(&self) -> &MemoryBackend {
        &self.inner
    }
}

#[async_trait]
impl SessionBackend for GatedBackend {
    async fn init(&self, request: &InitRequest) -> Result<SessionRecord, BackendError> {
        self.init_started.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        self.inner.init(request).await
    }

    async fn sync(&self, record: &SessionRecord) -> Result<(), BackendError> {
        self.inner.sync(record).await
    }
}
