//! Session orchestrator.
//!
//! Owns the single current [`SessionRecord`] and decides, from an external
//! authentication flag, whether it comes from the backend or is fabricated
//! locally.
//!
//! Every activation (a change of the flag) gets a generation number and a
//! cancellation token. Backend init runs in its own task; its result is only
//! installed if the generation is still current when it resolves, checked
//! under the same lock that teardown takes. A superseded init therefore can
//! never install a record or start a sync loop.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use session_sync_core::{
    ClientInfo, InitFailurePolicy, InitRequest, SessionBackend, SessionPatch, SessionRecord,
    SyncConfig,
};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    SessionHandle, SessionSnapshot, SessionStatus, lock,
    manager::{ManagerError, SessionManager, SyncHandle, SyncStats},
};

/// Metadata key carrying the init error on a degraded local record.
pub const SYNC_ERROR_KEY: &str = "sync_error";

/// Supplies the current navigation location.
pub type RouteProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Builder for [`SessionOrchestrator`].
pub struct SessionOrchestratorBuilder<B> {
    manager: SessionManager<B>,
    route: RouteProvider,
    client: ClientInfo,
    init_failure: InitFailurePolicy,
}

impl<B> SessionOrchestratorBuilder<B>
where
    B: SessionBackend + 'static,
{
    /// Read the current route from `provider` whenever a record is created.
    ///
    /// The provider is called without any orchestrator lock held, so it may
    /// query the orchestrator.
    #[must_use]
    pub fn route_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.route = Arc::new(provider);
        self
    }

    #[must_use]
    pub fn client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub const fn init_failure(mut self, policy: InitFailurePolicy) -> Self {
        self.init_failure = policy;
        self
    }

    /// Apply client identity and init failure policy from `config`.
    #[must_use]
    pub fn config(self, config: &SyncConfig) -> Self {
        self.client(config.client_info())
            .init_failure(config.init_failure)
    }

    #[must_use]
    pub fn build(self) -> SessionOrchestrator<B> {
        let (state, _) = watch::channel(SessionSnapshot::default());
        SessionOrchestrator {
            inner: Arc::new(Inner {
                manager: self.manager,
                route: self.route,
                client: self.client,
                init_failure: self.init_failure,
                state: Arc::new(state),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }
}

/// Session lifecycle controller.
///
/// Starts idle. The first [`SessionOrchestrator::set_authenticated`] call
/// activates it; later calls with a different flag tear the current session
/// down and start a fresh one. Dropping the orchestrator shuts it down.
pub struct SessionOrchestrator<B>
where
    B: SessionBackend + 'static,
{
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    manager: SessionManager<B>,
    route: RouteProvider,
    client: ClientInfo,
    init_failure: InitFailurePolicy,
    state: Arc<watch::Sender<SessionSnapshot>>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    generation: u64,
    /// Flag of the current activation; `None` while idle.
    authenticated: Option<bool>,
    closed: bool,
    init_cancel: Option<CancellationToken>,
    init_task: Option<JoinHandle<()>>,
    sync: Option<SyncHandle>,
    auth_follower: Option<JoinHandle<()>>,
}

impl<B> SessionOrchestrator<B>
where
    B: SessionBackend + 'static,
{
    #[must_use]
    pub fn builder(manager: SessionManager<B>) -> SessionOrchestratorBuilder<B> {
        SessionOrchestratorBuilder {
            manager,
            route: Arc::new(|| "/".to_string()),
            client: ClientInfo::default(),
            init_failure: InitFailurePolicy::default(),
        }
    }

    /// Create an orchestrator with default options.
    #[must_use]
    pub fn new(manager: SessionManager<B>) -> Self {
        Self::builder(manager).build()
    }

    /// Consumer access point.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(Arc::clone(&self.inner.state))
    }

    #[must_use]
    pub fn session(&self) -> Option<SessionRecord> {
        self.inner.state.borrow().session.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.state.borrow().is_ready()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status.clone()
    }

    /// See [`SessionHandle::update_session`].
    pub fn update_session(&self, patch: SessionPatch) -> bool {
        self.handle().update_session(patch)
    }

    /// Stats of the running sync loop, if any.
    #[must_use]
    pub fn sync_stats(&self) -> Option<SyncStats> {
        lock(&self.inner.lifecycle).sync.as_ref().map(SyncHandle::stats)
    }

    /// Re-evaluate the lifecycle for a new authentication flag.
    ///
    /// A no-op when the flag matches the current activation. The backend
    /// path spawns a task, so this must be called within a tokio runtime.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.inner.set_authenticated(authenticated);
    }

    /// Track an authentication flag published by another component.
    ///
    /// Applies the current value immediately, then every change until the
    /// sender is dropped or the orchestrator shuts down.
    pub fn follow_auth(&self, mut auth: watch::Receiver<bool>) {
        let initial = *auth.borrow_and_update();
        self.inner.set_authenticated(initial);

        let weak: Weak<Inner<B>> = Arc::downgrade(&self.inner);
        let mut lifecycle = lock(&self.inner.lifecycle);
        if lifecycle.closed {
            return;
        }
        let follower = tokio::spawn(async move {
            while auth.changed().await.is_ok() {
                let authenticated = *auth.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.set_authenticated(authenticated);
            }
        });
        if let Some(previous) = lifecycle.auth_follower.replace(follower) {
            previous.abort();
        }
    }

    /// Stop syncing and discard the session. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl<B> Drop for SessionOrchestrator<B>
where
    B: SessionBackend + 'static,
{
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl<B> Inner<B>
where
    B: SessionBackend + 'static,
{
    fn set_authenticated(self: &Arc<Self>, authenticated: bool) {
        // Read before locking; the provider may call back into the orchestrator.
        let route = (self.route)();
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.closed {
            tracing::debug!(authenticated, "orchestrator shut down; ignoring auth change");
            return;
        }
        if lifecycle.authenticated == Some(authenticated) {
            return;
        }

        self.teardown(&mut lifecycle);
        lifecycle.authenticated = Some(authenticated);

        if authenticated {
            self.begin_backend(&mut lifecycle, route);
        } else {
            self.begin_local(route);
        }
    }

    /// Stop the current activation. Leaves the published snapshot alone so
    /// the caller can replace it in one step.
    fn teardown(&self, lifecycle: &mut Lifecycle) {
        lifecycle.generation += 1;
        lifecycle.authenticated = None;

        if let Some(sync) = lifecycle.sync.take() {
            sync.cancel();
        }
        if let Some(token) = lifecycle.init_cancel.take() {
            token.cancel();
        }
        if let Some(task) = lifecycle.init_task.take() {
            task.abort();
        }
    }

    fn begin_local(&self, route: String) {
        let record = SessionRecord::local(route);
        tracing::info!(session_id = %record.id, route = %record.current_route, "local session created");
        self.publish(Some(record), SessionStatus::Local);
    }

    fn begin_backend(self: &Arc<Self>, lifecycle: &mut Lifecycle, route: String) {
        let generation = lifecycle.generation;
        let token = CancellationToken::new();
        let request = InitRequest::new(self.client.clone(), route);

        self.publish(None, SessionStatus::Initializing);
        tracing::debug!(generation, "initializing backend session");

        let inner = Arc::clone(self);
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = cancelled.cancelled() => {
                    tracing::debug!(generation, "session init cancelled");
                    return;
                }
                outcome = inner.manager.initialize(&request) => outcome,
            };
            inner.commit(generation, outcome);
        });

        lifecycle.init_cancel = Some(token);
        lifecycle.init_task = Some(task);
    }

    /// Install the result of the init started for `generation`.
    fn commit(&self, generation: u64, outcome: Result<SessionRecord, ManagerError>) {
        let fallback_route = outcome.is_err().then(|| (self.route)());
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.closed || lifecycle.generation != generation {
            tracing::debug!(generation, current = lifecycle.generation, "discarding superseded session init");
            return;
        }
        lifecycle.init_cancel = None;
        lifecycle.init_task = None;

        match outcome {
            Ok(record) if record.is_local() => {
                tracing::warn!(session_id = %record.id, "backend returned a local session; sync disabled");
                self.publish(Some(record), SessionStatus::Local);
            }
            Ok(record) => {
                let session_id = record.id.clone();
                let state = Arc::clone(&self.state);
                let loop_session = session_id.clone();
                let accessor = move || {
                    state
                        .borrow()
                        .session
                        .as_ref()
                        .filter(|current| current.id == loop_session)
                        .cloned()
                };

                self.publish(Some(record.clone()), SessionStatus::Synced);
                lifecycle.sync = Some(self.manager.start_sync_interval(&record, accessor));
                tracing::info!(session_id = %session_id, owner = %record.owner, "backend session ready");
            }
            Err(e) => self.init_failed(&e, fallback_route.unwrap_or_default()),
        }
    }

    fn init_failed(&self, error: &ManagerError, route: String) {
        let reason = error.to_string();
        match self.init_failure {
            InitFailurePolicy::FallbackLocal => {
                tracing::warn!(error = %reason, "session init failed; continuing with a local session");
                let mut record = SessionRecord::local(route);
                record.set_metadata(SYNC_ERROR_KEY, Value::String(reason.clone()));
                self.publish(Some(record), SessionStatus::Degraded { reason });
            }
            InitFailurePolicy::FailClosed => {
                tracing::warn!(error = %reason, "session init failed");
                self.publish(None, SessionStatus::Failed { reason });
            }
        }
    }

    fn shutdown(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.closed {
            return;
        }
        lifecycle.closed = true;

        if let Some(follower) = lifecycle.auth_follower.take() {
            follower.abort();
        }
        self.teardown(&mut lifecycle);
        self.publish(None, SessionStatus::Idle);
        tracing::info!("session orchestrator shut down");
    }

    fn publish(&self, session: Option<SessionRecord>, status: SessionStatus) {
        self.state.send_replace(SessionSnapshot { session, status });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            OnceLock,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use serde_json::json;
    use session_sync_core::{BackendError, Owner};

    use super::*;
    use crate::{backend::MemoryBackend, testing::GatedBackend};

    const PERIOD: Duration = Duration::from_secs(30);
    const SLACK: Duration = Duration::from_millis(1);

    fn orchestrator<B>(backend: &Arc<B>) -> SessionOrchestrator<B>
    where
        B: SessionBackend + 'static,
    {
        orchestrator_with(backend, InitFailurePolicy::FallbackLocal)
    }

    fn orchestrator_with<B>(backend: &Arc<B>, policy: InitFailurePolicy) -> SessionOrchestrator<B>
    where
        B: SessionBackend + 'static,
    {
        let manager = SessionManager::with_shared(Arc::clone(backend)).with_interval(PERIOD);
        SessionOrchestrator::builder(manager)
            .route_provider(|| "/a".to_string())
            .init_failure(policy)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthenticated_never_touches_backend() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        assert!(orch.session().is_none());

        orch.set_authenticated(false);
        assert!(orch.is_ready());
        assert_eq!(orch.status(), SessionStatus::Local);

        let session = orch.session().unwrap();
        assert_eq!(session.owner, Owner::Local);
        assert_eq!(session.current_route, "/a");
        assert_eq!(session.get_metadata("local_only"), Some(&json!(true)));

        orch.update_session(SessionPatch::new().route("/b"));
        tokio::time::sleep(PERIOD * 3).await;

        assert!(backend.init_requests().is_empty());
        assert_eq!(backend.sync_attempts(), 0);
        assert!(orch.sync_stats().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_session_syncs() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);

        orch.set_authenticated(true);
        assert_eq!(orch.status(), SessionStatus::Initializing);
        assert!(!orch.is_ready());

        let snapshot = orch.handle().wait_ready().await;
        assert_eq!(snapshot.status, SessionStatus::Synced);
        let session = snapshot.session.unwrap();
        assert_eq!(session.owner, Owner::User("u1".into()));

        let requests = backend.init_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].current_route, "/a");

        tokio::time::sleep(PERIOD + SLACK).await;
        assert_eq!(backend.synced().len(), 1);
        assert_eq!(backend.synced()[0].id, session.id);
        assert_eq!(orch.sync_stats().unwrap().pushes_ok, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_stable_across_updates() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(true);
        let initial = orch.handle().wait_ready().await.session.unwrap();

        let handle = orch.handle();
        for route in ["/b", "/c", "/d"] {
            assert!(handle.update_session(SessionPatch::new().route(route).thread([route])));
            let current = handle.session().unwrap();
            assert_eq!(current.id, initial.id);
            assert_eq!(current.owner, initial.owner);
            assert_eq!(current.started_at, initial.started_at);
        }
        assert_eq!(handle.session().unwrap().current_route, "/d");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_between_ticks_is_pushed() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(true);
        orch.handle().wait_ready().await;

        tokio::time::sleep(PERIOD + SLACK).await;
        assert_eq!(backend.last_synced().unwrap().current_route, "/a");

        orch.update_session(SessionPatch::new().route("/b"));
        tokio::time::sleep(PERIOD).await;

        let last = backend.last_synced().unwrap();
        assert_eq!(last.current_route, "/b");
        assert_eq!(backend.synced().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_updates_merge() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(true);
        orch.handle().wait_ready().await;

        orch.update_session(SessionPatch::new().metadata("x", json!(1)));
        orch.update_session(SessionPatch::new().metadata("y", json!(2)));

        let session = orch.session().unwrap();
        assert_eq!(session.get_metadata("x"), Some(&json!(1)));
        assert_eq!(session.get_metadata("y"), Some(&json!(2)));

        tokio::time::sleep(PERIOD + SLACK).await;
        let pushed = backend.last_synced().unwrap();
        assert_eq!(pushed.get_metadata("x"), Some(&json!(1)));
        assert_eq!(pushed.get_metadata("y"), Some(&json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_init_discards_result() {
        let backend = Arc::new(GatedBackend::new("u1"));
        let orch = orchestrator(&backend);

        orch.set_authenticated(true);
        tokio::task::yield_now().await;
        assert_eq!(backend.init_started(), 1);

        orch.shutdown();
        backend.release();
        tokio::time::sleep(PERIOD * 3).await;

        assert!(orch.session().is_none());
        assert_eq!(orch.status(), SessionStatus::Idle);
        assert!(orch.sync_stats().is_none());
        assert_eq!(backend.inner().sync_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_revoked_during_init_keeps_local_session() {
        let backend = Arc::new(GatedBackend::new("u1"));
        let orch = orchestrator(&backend);

        orch.set_authenticated(true);
        tokio::task::yield_now().await;
        orch.set_authenticated(false);
        let local = orch.session().unwrap();
        assert!(local.is_local());

        backend.release();
        tokio::time::sleep(PERIOD * 3).await;

        assert_eq!(orch.session().unwrap().id, local.id);
        assert_eq!(orch.status(), SessionStatus::Local);
        assert_eq!(backend.inner().sync_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_commit_is_discarded() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(false);
        let local = orch.session().unwrap();

        let stale = SessionRecord::new("srv-stale", Owner::User("u1".into()), "/");
        orch.inner.commit(0, Ok(stale));

        assert_eq!(orch.session().unwrap().id, local.id);
        assert!(orch.sync_stats().is_none());
        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(backend.sync_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_flip_restarts_lifecycle() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);

        orch.set_authenticated(true);
        let first = orch.handle().wait_ready().await.session.unwrap();
        tokio::time::sleep(PERIOD + SLACK).await;
        assert_eq!(backend.sync_attempts(), 1);

        orch.set_authenticated(false);
        assert!(orch.session().unwrap().is_local());
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.sync_attempts(), 1);

        orch.set_authenticated(true);
        let second = orch.handle().wait_ready().await.session.unwrap();
        assert_ne!(first.id, second.id);

        tokio::time::sleep(PERIOD + SLACK).await;
        assert_eq!(backend.sync_attempts(), 2);
        assert_eq!(backend.last_synced().unwrap().id, second.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_flag_is_noop() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(false);
        let first = orch.session().unwrap();

        orch.set_authenticated(false);
        assert_eq!(orch.session().unwrap().id, first.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_failure_degrades_to_local() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        backend.fail_init(BackendError::Unreachable("connection refused".into()));
        let orch = orchestrator(&backend);

        orch.set_authenticated(true);
        let snapshot = orch.handle().wait_settled().await;

        assert!(matches!(snapshot.status, SessionStatus::Degraded { .. }));
        assert!(snapshot.is_ready());
        let session = snapshot.session.unwrap();
        assert!(session.is_local());
        assert!(session.get_metadata(SYNC_ERROR_KEY).is_some());

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.sync_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_provider_may_query_orchestrator() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        backend.fail_init(BackendError::Unreachable("connection refused".into()));

        let slot: Arc<OnceLock<Weak<Inner<MemoryBackend>>>> = Arc::new(OnceLock::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = SessionManager::with_shared(Arc::clone(&backend)).with_interval(PERIOD);
        let orch = SessionOrchestrator::builder(manager)
            .route_provider({
                let slot = Arc::clone(&slot);
                let calls = Arc::clone(&calls);
                move || {
                    if let Some(inner) = slot.get().and_then(Weak::upgrade) {
                        let syncing = lock(&inner.lifecycle).sync.is_some();
                        calls.fetch_add(1, Ordering::SeqCst);
                        return if syncing { "/syncing" } else { "/idle" }.to_string();
                    }
                    "/".to_string()
                }
            })
            .build();
        assert!(slot.set(Arc::downgrade(&orch.inner)).is_ok());

        orch.set_authenticated(false);
        assert_eq!(orch.session().unwrap().current_route, "/idle");

        orch.set_authenticated(true);
        let snapshot = orch.handle().wait_settled().await;
        assert!(matches!(snapshot.status, SessionStatus::Degraded { .. }));
        assert_eq!(snapshot.session.unwrap().current_route, "/idle");

        backend.clear_init_failure();
        orch.set_authenticated(false);
        orch.set_authenticated(true);
        let snapshot = orch.handle().wait_settled().await;
        assert_eq!(snapshot.status, SessionStatus::Synced);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_failure_fail_closed() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        backend.fail_init(BackendError::Rejected {
            status: 500,
            message: "boom".into(),
        });
        let orch = orchestrator_with(&backend, InitFailurePolicy::FailClosed);

        orch.set_authenticated(true);
        let snapshot = orch.handle().wait_settled().await;

        assert!(matches!(snapshot.status, SessionStatus::Failed { ref reason } if reason.contains("boom")));
        assert!(snapshot.session.is_none());
        assert!(!orch.is_ready());
        assert!(!orch.update_session(SessionPatch::new().route("/b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_local_record_does_not_sync() {
        let backend = Arc::new(MemoryBackend::with_owner(Owner::Local));
        let orch = orchestrator(&backend);

        orch.set_authenticated(true);
        let snapshot = orch.handle().wait_ready().await;
        assert_eq!(snapshot.status, SessionStatus::Local);
        assert!(snapshot.session.unwrap().is_local());

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.sync_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sync_and_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(true);
        orch.handle().wait_ready().await;

        tokio::time::sleep(PERIOD + SLACK).await;
        assert_eq!(backend.sync_attempts(), 1);

        orch.shutdown();
        orch.shutdown();
        assert!(orch.session().is_none());

        orch.set_authenticated(false);
        assert!(orch.session().is_none());

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.sync_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_sync() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        orch.set_authenticated(true);
        let handle = orch.handle();
        handle.wait_ready().await;

        drop(orch);
        assert!(handle.session().is_none());
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.sync_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_auth_tracks_changes() {
        let backend = Arc::new(MemoryBackend::new("u1"));
        let orch = orchestrator(&backend);
        let (auth_tx, auth_rx) = watch::channel(false);

        orch.follow_auth(auth_rx);
        assert_eq!(orch.status(), SessionStatus::Local);

        let mut updates = orch.handle().subscribe();
        auth_tx.send(true).unwrap();
        updates
            .wait_for(|snapshot| snapshot.status == SessionStatus::Synced)
            .await
            .unwrap();
        assert_eq!(backend.init_requests().len(), 1);

        auth_tx.send(false).unwrap();
        updates
            .wait_for(|snapshot| snapshot.status == SessionStatus::Local)
            .await
            .unwrap();
    }
}
