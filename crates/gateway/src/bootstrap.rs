//! AppState construction and background-task spawning extracted from
//! `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use cr_browser::{BrowserEngine, CdpEngine};
use cr_domain::config::{Config, ConfigSeverity};
use cr_sessions::SessionRegistry;
use tokio_util::task::TaskTracker;

use crate::api::auth::BasicAuth;
use crate::state::AppState;

/// Validate config, read credentials and return a fully-wired
/// [`AppState`] driving a local Chrome through the DevTools engine.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    build_app_state_with_engine(config, Arc::new(CdpEngine::new()))
}

/// Same as [`build_app_state`] with an explicit automation engine.
pub fn build_app_state_with_engine(
    config: Arc<Config>,
    engine: Arc<dyn BrowserEngine>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Basic auth (read once) ───────────────────────────────────────
    let basic_auth = BasicAuth::from_env(&config.server.auth).map(Arc::new);
    if basic_auth.is_some() {
        tracing::info!(
            user_env = %config.server.auth.user_env,
            "basic auth enabled"
        );
    } else {
        tracing::warn!(
            user_env = %config.server.auth.user_env,
            password_env = %config.server.auth.password_env,
            "basic auth credentials not set, all routes are open"
        );
    }

    tracing::info!(
        headless = config.browser.headless,
        slow_mo_ms = config.browser.slow_mo_ms,
        "browser engine ready"
    );

    Ok(AppState {
        config,
        registry: Arc::new(SessionRegistry::new()),
        engine,
        basic_auth,
        workers: TaskTracker::new(),
    })
}

/// Spawn the periodic session reaper. Disabled when retention is zero.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic terminal-session eviction ───────────────────────────
    let retention = Duration::from_secs(state.config.sessions.retention_secs);
    if retention.is_zero() {
        tracing::info!("session retention disabled, sessions live until shutdown");
        return;
    }

    let registry = state.registry.clone();
    let every = Duration::from_secs(state.config.sessions.reap_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = registry.reap_terminal(retention, chrono::Utc::now());
            if removed > 0 {
                tracing::debug!(removed, remaining = registry.len(), "reaped terminal sessions");
            }
        }
    });
}

/// Cancel every in-flight purchase and wait up to `grace` for the
/// workers to settle their sessions and close their browsers.
///
/// Returns `false` if some workers were still running when `grace`
/// elapsed.
pub async fn drain_workers(state: &AppState, grace: Duration) -> bool {
    let cancelled = state.registry.cancel_all();
    state.workers.close();
    tracing::info!(cancelled, pending = state.workers.len(), "draining purchase workers");

    match tokio::time::timeout(grace, state.workers.wait()).await {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(
                pending = state.workers.len(),
                grace_secs = grace.as_secs(),
                "purchase workers still running at shutdown"
            );
            false
        }
    }
}
