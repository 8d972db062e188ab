//! The purchase worker: one task per session driving the scripted flow
//! login -> product -> availability -> cart -> checkout.
//!
//! Every stage announces itself with an `info` event.  Whatever happens
//! inside the flow (stage failure, browser fault, cancellation or a panic)
//! ends in exactly one terminal event and a terminal status; nothing
//! escapes the task.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use cr_browser::{Browser, BrowserEngine, BrowserError, LaunchOptions, SelectorState, WaitUntil};
use cr_domain::config::Config;
use cr_domain::trace::TraceEvent;
use cr_domain::{LogEvent, SessionStatus};
use cr_sessions::Session;

const BANNER: &str = "============================================================";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Credentials and target for one attempt. Lives only as long as the
/// worker task.
#[derive(Clone)]
pub struct PurchaseRequest {
    pub email: String,
    pub password: String,
    pub product_url: String,
}

impl std::fmt::Debug for PurchaseRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("product_url", &self.product_url)
            .finish()
    }
}

/// Why a flow stopped short of completion.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Login failed - check credentials")]
    LoginFailed,
    #[error("Product not available or sold out")]
    Unavailable,
    #[error("Cancelled")]
    Cancelled,
    #[error("worker panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl FlowError {
    /// Text of the terminal error event.
    pub fn event_message(&self) -> String {
        match self {
            Self::LoginFailed | Self::Unavailable | Self::Cancelled => format!("❌ {self}"),
            Self::Panicked(_) | Self::Browser(_) => format!("❌ Error: {self}"),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::LoginFailed => "login_failed",
            Self::Unavailable => "unavailable",
            Self::Cancelled => "cancelled",
            Self::Panicked(_) => "panic",
            Self::Browser(_) => "browser_error",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry points
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatch the worker for `session` on the runtime, tracked by `workers`.
pub fn spawn(
    workers: &TaskTracker,
    session: Arc<Session>,
    engine: Arc<dyn BrowserEngine>,
    config: Arc<Config>,
    request: PurchaseRequest,
) -> JoinHandle<()> {
    workers.spawn(run_purchase(session, engine, config, request))
}

/// Run the whole flow for `session` and settle it in a terminal state.
pub async fn run_purchase(
    session: Arc<Session>,
    engine: Arc<dyn BrowserEngine>,
    config: Arc<Config>,
    request: PurchaseRequest,
) {
    if let Err(e) = session.transition(SessionStatus::Running) {
        tracing::warn!(session_id = %session.id(), error = %e, "worker not started");
        return;
    }

    let cancel = session.cancellation().clone();
    let flow = AssertUnwindSafe(purchase_flow(&session, engine.as_ref(), &config, &request))
        .catch_unwind();

    let outcome = tokio::select! {
        result = flow => match result {
            Ok(outcome) => outcome,
            Err(payload) => Err(FlowError::Panicked(panic_message(payload.as_ref()))),
        },
        _ = cancel.cancelled() => Err(FlowError::Cancelled),
    };

    // A stop that lands after the flow finished but before the session
    // settled still wins.
    let outcome = match outcome {
        Ok(()) => match session.complete_unless_cancelled() {
            Ok(true) => Ok(()),
            Ok(false) => Err(FlowError::Cancelled),
            Err(e) => {
                tracing::error!(session_id = %session.id(), error = %e, "status transition rejected");
                return;
            }
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => {
            // The browser stays open for the human to finish checkout.
            session.emit(LogEvent::complete());
            tracing::info!(session_id = %session.id(), "purchase flow complete");
        }
        Err(e) => {
            tracing::warn!(
                session_id = %session.id(),
                reason = e.label(),
                error = %e,
                "purchase flow failed"
            );
            release_browser(&session, e.label()).await;
            settle(&session, SessionStatus::Error);
            session.emit(LogEvent::error(e.event_message()));
        }
    }
}

fn settle(session: &Session, status: SessionStatus) {
    if let Err(e) = session.transition(status) {
        tracing::error!(session_id = %session.id(), error = %e, "status transition rejected");
    }
}

/// Close and forget the session's browser, if one was launched.
async fn release_browser(session: &Session, reason: &str) {
    let Some(browser) = session.take_browser() else {
        return;
    };
    if let Err(e) = browser.close().await {
        tracing::warn!(session_id = %session.id(), error = %e, "browser close failed");
    }
    TraceEvent::BrowserReleased {
        session_id: session.id().to_string(),
        reason: reason.to_string(),
    }
    .emit();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn stage(session: &Session, name: &str, message: &str) {
    TraceEvent::StageStarted {
        session_id: session.id().to_string(),
        stage: name.to_string(),
    }
    .emit();
    session.emit(LogEvent::info(message));
}

async fn purchase_flow(
    session: &Session,
    engine: &dyn BrowserEngine,
    config: &Config,
    request: &PurchaseRequest,
) -> Result<(), FlowError> {
    let flow = &config.flow;
    let timing = &flow.timing;
    let selectors = &flow.selectors;

    // ── Launch ──────────────────────────────────────────────────────
    stage(session, "launch", "🚀 Starting browser automation...");
    let started = Instant::now();
    let options = LaunchOptions::from_config(&config.browser);
    let browser: Arc<dyn Browser> = Arc::from(engine.launch(&options).await?);
    session.install_browser(browser.clone());
    TraceEvent::BrowserLaunched {
        session_id: session.id().to_string(),
        headless: options.headless,
        duration_ms: started.elapsed().as_millis() as u64,
    }
    .emit();
    let page = browser.new_page(config.browser.viewport.into()).await?;

    // ── Login ───────────────────────────────────────────────────────
    stage(session, "login", "🔐 Logging in to P-Bandai...");
    page.goto(&flow.login_url, WaitUntil::NetworkIdle).await?;
    page.fill(&selectors.email, &request.email).await?;
    tokio::time::sleep(timing.fill_pause()).await;
    page.fill(&selectors.password, &request.password).await?;
    tokio::time::sleep(timing.fill_pause()).await;
    page.click(&selectors.submit).await?;

    match page
        .wait_for_load_state(WaitUntil::NetworkIdle, timing.login_settle_timeout())
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_timeout() => {
            tracing::debug!(session_id = %session.id(), "login settle timed out, continuing");
        }
        Err(e) => return Err(e.into()),
    }
    tokio::time::sleep(timing.login_pause()).await;

    let landed = page.url().await?;
    if landed
        .to_lowercase()
        .contains(&flow.login_marker.to_lowercase())
    {
        return Err(FlowError::LoginFailed);
    }
    session.emit(LogEvent::info("✅ Login successful"));

    // ── Product ─────────────────────────────────────────────────────
    stage(session, "navigate", "🎯 Going to product page...");
    page.goto(&request.product_url, WaitUntil::NetworkIdle).await?;

    // ── Availability ────────────────────────────────────────────────
    stage(session, "availability", "⏳ Waiting for 'Add to Cart' button...");
    let mut found = false;
    for selector in &selectors.add_to_cart {
        match page
            .wait_for_selector(selector, timing.availability_timeout(), SelectorState::Visible)
            .await
        {
            Ok(()) => {
                session.emit(LogEvent::info("🎉 Found Add to Cart button"));
                page.click(selector).await?;
                found = true;
                break;
            }
            Err(e) if e.is_timeout() => {
                tracing::debug!(session_id = %session.id(), selector = %selector, "indicator never appeared");
            }
            Err(e) => return Err(e.into()),
        }
    }
    if !found {
        return Err(FlowError::Unavailable);
    }

    tokio::time::sleep(timing.add_to_cart_pause()).await;
    session.emit(LogEvent::info("🛒 Added to cart"));

    // ── Cart + checkout ─────────────────────────────────────────────
    stage(session, "cart", "🛍️ Going to cart...");
    page.goto(&flow.cart_url, WaitUntil::NetworkIdle).await?;
    tokio::time::sleep(timing.cart_pause()).await;

    stage(session, "checkout", "💳 Starting checkout...");
    for selector in &selectors.checkout {
        let attempt = async {
            if page.count(selector).await? == 0 {
                return Ok(false);
            }
            page.click(selector).await?;
            Ok::<_, BrowserError>(true)
        };
        match attempt.await {
            Ok(true) => {
                session.emit(LogEvent::info("✅ Checkout started"));
                break;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(session_id = %session.id(), selector = %selector, error = %e, "checkout candidate skipped");
            }
        }
    }
    tokio::time::sleep(timing.checkout_pause()).await;

    // ── Finalize ────────────────────────────────────────────────────
    for line in [
        BANNER,
        "✅ BOT COMPLETE",
        "👉 Complete checkout in the browser window",
        BANNER,
    ] {
        session.emit(LogEvent::info(line));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::scripted::{Script, ScriptedEngine};
    use cr_domain::config::FlowSelectors;
    use cr_domain::Level;
    use cr_sessions::{Popped, SessionRegistry};
    use std::time::Duration;

    const PRODUCT: &str = "https://p-bandai.com/us/item/N2712345001";
    const MYPAGE: &str = "https://p-bandai.com/us/mypage";

    fn request() -> PurchaseRequest {
        PurchaseRequest {
            email: "buyer@example.com".into(),
            password: "hunter2".into(),
            product_url: PRODUCT.into(),
        }
    }

    /// A site where login succeeds and the first add-to-cart selector is
    /// visible immediately.
    fn happy_script() -> Script {
        let sel = FlowSelectors::default();
        Script::default()
            .redirect(sel.submit.clone(), MYPAGE)
            .visible(sel.add_to_cart[0].clone())
            .count(sel.checkout[0].clone(), 1)
    }

    fn drain(session: &Session) -> Vec<LogEvent> {
        let mut out = Vec::new();
        while let Some(e) = session.channel().try_pop() {
            out.push(e);
        }
        out
    }

    async fn run(script: Script) -> (Arc<Session>, Arc<Script>) {
        let engine = ScriptedEngine::new(script);
        let registry = SessionRegistry::new();
        let session = registry.create();
        run_purchase(
            session.clone(),
            Arc::new(engine.clone()),
            Arc::new(Config::default()),
            request(),
        )
        .await;
        (session, engine.script)
    }

    #[tokio::test(start_paused = true)]
    async fn full_success_leaves_browser_open() {
        let (session, script) = run(happy_script()).await;
        assert_eq!(session.status(), SessionStatus::Complete);
        assert!(session.has_browser());
        assert!(!script.is_closed());

        let events = drain(&session);
        let (last, rest) = events.split_last().unwrap();
        assert_eq!(last.message, "COMPLETE");
        assert_eq!(last.level, Level::Success);
        assert!(rest.iter().all(|e| e.level == Level::Info));

        let messages: Vec<_> = rest.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.first(), Some(&"🚀 Starting browser automation..."));
        assert!(messages.contains(&"✅ Login successful"));
        assert!(messages.contains(&"🎉 Found Add to Cart button"));
        assert!(messages.contains(&"✅ Checkout started"));
        assert!(messages.contains(&"✅ BOT COMPLETE"));
        assert_eq!(messages.iter().filter(|m| **m == BANNER).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flow_visits_pages_in_order() {
        let (_session, script) = run(happy_script()).await;
        let config = Config::default();
        let gotos: Vec<_> = script
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("goto "))
            .collect();
        assert_eq!(
            gotos,
            [
                format!("goto {}", config.flow.login_url),
                format!("goto {PRODUCT}"),
                format!("goto {}", config.flow.cart_url),
            ]
        );
        assert!(script.calls().contains(&"new_page 1280x720".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn staying_on_login_page_is_an_auth_failure() {
        let sel = FlowSelectors::default();
        // No redirect: the page still shows the login URL after submit.
        let script = Script::default().visible(sel.add_to_cart[0].clone());
        let (session, script) = run(script).await;

        assert_eq!(session.status(), SessionStatus::Error);
        assert!(script.is_closed());
        assert!(!session.has_browser());

        let events = drain(&session);
        let last = events.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.message, "❌ Login failed - check credentials");
        assert!(!script.calls().iter().any(|c| c.contains(PRODUCT)));
    }

    #[tokio::test(start_paused = true)]
    async fn no_indicator_means_unavailable() {
        let sel = FlowSelectors::default();
        let script = Script::default().redirect(sel.submit.clone(), MYPAGE);
        let (session, script) = run(script).await;

        assert_eq!(session.status(), SessionStatus::Error);
        assert!(script.is_closed());

        let events = drain(&session);
        let errors: Vec<_> = events.iter().filter(|e| e.level == Level::Error).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("not available"));
        assert!(events.last().unwrap().is_terminal());

        // Every candidate was tried in order.
        let waits: Vec<_> = script
            .calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("wait ").map(String::from))
            .collect();
        assert_eq!(waits, sel.add_to_cart);
    }

    #[tokio::test(start_paused = true)]
    async fn later_indicator_is_used_when_earlier_ones_time_out() {
        let sel = FlowSelectors::default();
        let script = Script::default()
            .redirect(sel.submit.clone(), MYPAGE)
            .visible(sel.add_to_cart[2].clone());
        let (session, script) = run(script).await;
        assert_eq!(session.status(), SessionStatus::Complete);
        assert!(script
            .calls()
            .contains(&format!("click {}", sel.add_to_cart[2])));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_checkout_button_is_not_fatal() {
        let sel = FlowSelectors::default();
        let mut script = Script::default()
            .redirect(sel.submit.clone(), MYPAGE)
            .visible(sel.add_to_cart[0].clone())
            .count(sel.checkout[0].clone(), 1)
            .count(sel.checkout[2].clone(), 1);
        script.failing_clicks.insert(sel.checkout[0].clone());
        let (session, script) = run(script).await;

        assert_eq!(session.status(), SessionStatus::Complete);
        // First candidate failed, second absent, third clicked.
        assert!(script
            .calls()
            .contains(&format!("click {}", sel.checkout[2])));
        let events = drain(&session);
        assert!(events.iter().any(|e| e.message == "✅ Checkout started"));
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_becomes_error_event() {
        let script = Script {
            launch_error: Some("no chrome here".into()),
            ..Default::default()
        };
        let (session, script) = run(script).await;
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(!script.is_closed(), "nothing was launched so nothing to close");

        let events = drain(&session);
        let last = events.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert!(last.message.starts_with("❌ Error: "));
        assert!(last.message.contains("no chrome here"));
    }

    #[tokio::test(start_paused = true)]
    async fn panic_is_contained() {
        let sel = FlowSelectors::default();
        let script = Script {
            panic_on_click: Some(sel.submit.clone()),
            ..Default::default()
        };
        let (session, script) = run(script).await;

        assert_eq!(session.status(), SessionStatus::Error);
        assert!(script.is_closed());
        let events = drain(&session);
        let last = events.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert!(last.message.contains("scripted panic"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_waiting_releases_browser() {
        let sel = FlowSelectors::default();
        let engine = ScriptedEngine::new(Script::default().redirect(sel.submit.clone(), MYPAGE));
        let registry = SessionRegistry::new();
        let session = registry.create();

        let workers = TaskTracker::new();
        let handle = spawn(
            &workers,
            session.clone(),
            Arc::new(engine.clone()),
            Arc::new(Config::default()),
            request(),
        );

        // Past login, well inside the first five-minute availability wait.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(session.cancel());
        handle.await.unwrap();

        assert_eq!(session.status(), SessionStatus::Error);
        assert!(engine.script.is_closed());
        let mut last = None;
        while let Popped::Event(e) = session.channel().pop(Duration::from_millis(1)).await {
            last = Some(e);
        }
        let last = last.unwrap();
        assert_eq!(last.level, Level::Error);
        assert!(last.message.contains("Cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_on_same_session_is_refused() {
        let (session, script) = run(happy_script()).await;
        let before = script.launches.load(std::sync::atomic::Ordering::SeqCst);
        run_purchase(
            session.clone(),
            Arc::new(ScriptedEngine { script: script.clone() }),
            Arc::new(Config::default()),
            request(),
        )
        .await;
        assert_eq!(script.launches.load(std::sync::atomic::Ordering::SeqCst), before);
        assert_eq!(session.status(), SessionStatus::Complete);
    }

    #[test]
    fn request_debug_hides_password() {
        let shown = format!("{:?}", request());
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("buyer@example.com"));
    }
}
