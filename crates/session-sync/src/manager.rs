//! Session manager: backend handshake and the recurring sync loop.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use session_sync_core::{
    BackendError, InitRequest, MAX_SYNC_INTERVAL_SECS, SessionBackend, SessionId, SessionRecord,
    SyncConfig,
};
use tokio::{
    task::{JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::lock;

/// Push cadence used when none is configured.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest sync period; shorter values are raised to this.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Longest sync period; longer values are lowered to this.
pub const MAX_SYNC_INTERVAL: Duration = Duration::from_secs(MAX_SYNC_INTERVAL_SECS);

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Session initialization timed out after {0:?}")]
    InitTimeout(Duration),
}

/// Backend-facing half of the session lifecycle.
///
/// Holds no session record. The sync loop reads the record to push through
/// an accessor supplied by the caller, so updates made after the loop starts
/// are always picked up.
pub struct SessionManager<B> {
    backend: Arc<B>,
    interval: Duration,
    init_timeout: Option<Duration>,
}

impl<B> Clone for SessionManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            interval: self.interval,
            init_timeout: self.init_timeout,
        }
    }
}

impl<B> SessionManager<B>
where
    B: SessionBackend + 'static,
{
    /// Create a manager with the default 30 second cadence.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_shared(Arc::new(backend))
    }

    /// Create a manager over a backend that is also used elsewhere.
    #[must_use]
    pub const fn with_shared(backend: Arc<B>) -> Self {
        Self {
            backend,
            interval: DEFAULT_SYNC_INTERVAL,
            init_timeout: None,
        }
    }

    /// Create a manager using the cadence and timeouts from `config`.
    #[must_use]
    pub fn from_config(backend: Arc<B>, config: &SyncConfig) -> Self {
        Self::with_shared(backend)
            .with_interval(config.sync_interval())
            .with_init_timeout(config.init_timeout())
    }

    /// Override the sync period, clamped to
    /// [`MIN_SYNC_INTERVAL`]..=[`MAX_SYNC_INTERVAL`].
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        let clamped = interval.clamp(MIN_SYNC_INTERVAL, MAX_SYNC_INTERVAL);
        if clamped != interval {
            tracing::warn!(
                requested_secs = interval.as_secs_f64(),
                interval_secs = clamped.as_secs_f64(),
                "sync interval out of range; clamped"
            );
        }
        self.interval = clamped;
        self
    }

    /// Bound how long `initialize` may wait on the backend.
    #[must_use]
    pub const fn with_init_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.init_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Obtain a server-tracked session.
    ///
    /// # Errors
    /// Returns error if the backend rejects the handshake, is unreachable, or
    /// does not answer within the configured init timeout.
    pub async fn initialize(&self, request: &InitRequest) -> Result<SessionRecord, ManagerError> {
        let init = self.backend.init(request);
        let record = match self.init_timeout {
            Some(limit) => tokio::time::timeout(limit, init)
                .await
                .map_err(|_| ManagerError::InitTimeout(limit))??,
            None => init.await?,
        };

        tracing::debug!(session_id = %record.id, owner = %record.owner, "backend session initialized");
        Ok(record)
    }

    /// Start pushing the current record every period.
    ///
    /// `get_current` is called on every tick; returning `None` skips that
    /// tick. The first push happens one full period after this call. A failed
    /// push is logged and counted, and the loop keeps going. Local-only
    /// records are never pushed; if `initial` is local no loop is started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sync_interval<F>(&self, initial: &SessionRecord, get_current: F) -> SyncHandle
    where
        F: Fn() -> Option<SessionRecord> + Send + 'static,
    {
        let token = CancellationToken::new();
        let stats = Arc::new(StatsCell::default());

        if initial.is_local() {
            tracing::debug!(session_id = %initial.id, "local session; sync loop not started");
            token.cancel();
            return SyncHandle {
                token,
                stats,
                task: Mutex::new(None),
            };
        }

        let task = tokio::spawn(sync_loop(
            Arc::clone(&self.backend),
            self.interval,
            get_current,
            token.clone(),
            Arc::clone(&stats),
            initial.id.clone(),
        ));

        tracing::debug!(
            session_id = %initial.id,
            interval_secs = self.interval.as_secs_f64(),
            "sync loop started"
        );

        SyncHandle {
            token,
            stats,
            task: Mutex::new(Some(task)),
        }
    }
}

async fn sync_loop<B, F>(
    backend: Arc<B>,
    period: Duration,
    get_current: F,
    token: CancellationToken,
    stats: Arc<StatsCell>,
    session_id: SessionId,
) where
    B: SessionBackend + 'static,
    F: Fn() -> Option<SessionRecord> + Send + 'static,
{
    let Some(first_tick) = Instant::now().checked_add(period) else {
        tracing::error!(
            session_id = %session_id,
            interval_secs = period.as_secs_f64(),
            "sync period overflows the clock; sync loop not started"
        );
        token.cancel();
        return;
    };
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Pushes run beside the ticker so a hung request never delays the next tick.
    let mut pushes = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            Some(_) = pushes.join_next(), if !pushes.is_empty() => continue,
            _ = ticker.tick() => {}
        }

        stats.ticks.fetch_add(1, Ordering::Relaxed);

        let Some(record) = get_current() else {
            tracing::trace!(session_id = %session_id, "no current record; skipping tick");
            continue;
        };
        if record.is_local() {
            tracing::trace!(session_id = %session_id, "current record is local; skipping tick");
            continue;
        }

        let backend = Arc::clone(&backend);
        let stats = Arc::clone(&stats);
        pushes.spawn(async move {
            match backend.sync(&record).await {
                Ok(()) => {
                    stats.record_success();
                    tracing::debug!(session_id = %record.id, "session synced");
                }
                Err(e) => {
                    stats.record_failure(&e);
                    tracing::warn!(session_id = %record.id, error = %e, "session sync failed");
                }
            }
        });
    }

    pushes.abort_all();
    tracing::debug!(session_id = %session_id, "sync loop stopped");
}

#[derive(Default)]
struct StatsCell {
    ticks: AtomicU64,
    pushes_ok: AtomicU64,
    pushes_failed: AtomicU64,
    last: Mutex<LastPush>,
}

#[derive(Default)]
struct LastPush {
    error: Option<String>,
    success_at: Option<DateTime<Utc>>,
}

impl StatsCell {
    fn record_success(&self) {
        self.pushes_ok.fetch_add(1, Ordering::Relaxed);
        lock(&self.last).success_at = Some(Utc::now());
    }

    fn record_failure(&self, error: &BackendError) {
        self.pushes_failed.fetch_add(1, Ordering::Relaxed);
        lock(&self.last).error = Some(error.to_string());
    }

    fn snapshot(&self) -> SyncStats {
        let last = lock(&self.last);
        SyncStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            pushes_ok: self.pushes_ok.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
            last_error: last.error.clone(),
            last_success_at: last.success_at,
        }
    }
}

/// Counters for one sync loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Timer ticks fired, including skipped ones.
    pub ticks: u64,
    pub pushes_ok: u64,
    pub pushes_failed: u64,
    /// Most recent push failure, if any.
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Cancellation handle for a running sync loop.
///
/// Cancelling is idempotent. Dropping the handle cancels the loop.
pub struct SyncHandle {
    token: CancellationToken,
    stats: Arc<StatsCell>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncHandle {
    /// Stop all future ticks and abort pushes still in flight.
    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }

    /// Whether the loop may still push.
    ///
    /// False once cancelled or once the loop task has exited for any reason.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && lock(&self.task)
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.snapshot()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("active", &self.is_active())
            .field("stats", &self.stats())
            .finish()
    }
}
