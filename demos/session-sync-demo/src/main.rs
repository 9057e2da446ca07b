//! Session sync demo.
//!
//! Run with: cargo run -p session-sync-demo
//!
//! Starts unauthenticated with a local-only session, signs in after a few
//! seconds, then simulates navigation while the session is pushed to the
//! backend. Set `SESSION_SYNC_URL` to push to a real server; otherwise an
//! in-memory backend is used. Stop with Ctrl-C.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;
use session_sync::{
    Modality, SessionBackend, SessionManager, SessionOrchestrator, SessionPatch, SyncConfig,
    backend::{HttpBackend, MemoryBackend},
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ROUTES: [&str; 4] = ["/dashboard", "/leads", "/chat", "/briefing"];
const SIGN_IN_DELAY: Duration = Duration::from_secs(3);
const NAVIGATE_EVERY: Duration = Duration::from_secs(7);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,session_sync=debug".into()),
        )
        .init();

    let config = SyncConfig::from_env()?;

    if config.base_url.is_some() {
        let backend = HttpBackend::from_config(&config)?;
        run(backend, &config).await
    } else {
        tracing::info!("SESSION_SYNC_URL not set; using in-memory backend");
        run(MemoryBackend::new("demo-user"), &config).await
    }
}

async fn run<B>(backend: B, config: &SyncConfig) -> anyhow::Result<()>
where
    B: SessionBackend + 'static,
{
    let route = Arc::new(Mutex::new(ROUTES[0].to_string()));
    let route_for_provider = Arc::clone(&route);

    let manager = SessionManager::from_config(Arc::new(backend), config);
    let orchestrator = SessionOrchestrator::builder(manager)
        .config(config)
        .route_provider(move || {
            route_for_provider
                .lock()
                .map(|r| r.clone())
                .unwrap_or_else(|_| "/".to_string())
        })
        .build();

    let (auth_tx, auth_rx) = watch::channel(false);
    orchestrator.follow_auth(auth_rx);

    let handle = orchestrator.handle();
    if let Some(session) = handle.session() {
        tracing::info!(session_id = %session.id, owner = %session.owner, "started");
    }

    let sign_in = tokio::spawn(async move {
        tokio::time::sleep(SIGN_IN_DELAY).await;
        tracing::info!("signing in");
        let _ = auth_tx.send(true);
        auth_tx
    });

    let navigator = {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(NAVIGATE_EVERY);
            let mut step = 0usize;
            loop {
                ticker.tick().await;
                step += 1;
                let next = ROUTES[step % ROUTES.len()];
                if let Ok(mut current) = route.lock() {
                    *current = next.to_string();
                }
                let modality = if next == "/chat" {
                    Modality::Voice
                } else {
                    Modality::Text
                };
                handle.update_session(
                    SessionPatch::new()
                        .route(next)
                        .modality(modality)
                        .metadata("visits", json!(step)),
                );
                tracing::info!(route = next, status = ?handle.status(), "navigated");
            }
        })
    };

    tokio::signal::ctrl_c().await?;

    navigator.abort();
    // Keep the auth sender alive until here so the follower keeps running.
    let _auth_tx = sign_in.await.ok();

    if let Some(stats) = orchestrator.sync_stats() {
        tracing::info!(
            ticks = stats.ticks,
            pushed = stats.pushes_ok,
            failed = stats.pushes_failed,
            last_error = ?stats.last_error,
            "sync stats"
        );
    }
    orchestrator.shutdown();
    Ok(())
}
