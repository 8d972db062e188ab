//! [`Page`] over a DevTools target.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::connection::CdpConnection;
use super::selector;
use crate::engine::{Page, SelectorState, WaitUntil};
use crate::error::{BrowserError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Quiet period with no new resource entries that counts as network idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);
/// Set on `window` before a cross-document navigation; its absence proves
/// the new document replaced the old one.
const NAV_MARKER: &str = "__cartrunnerPendingNav";

pub struct CdpPage {
    conn: CdpConnection,
    slow_mo: Duration,
    navigation_timeout: Duration,
}

impl CdpPage {
    pub(super) fn new(conn: CdpConnection, slow_mo: Duration, navigation_timeout: Duration) -> Self {
        Self {
            conn,
            slow_mo,
            navigation_timeout,
        }
    }

    /// Evaluate an expression and return its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .conn
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception");
            return Err(BrowserError::Script(message.to_string()));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn throttle(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    async fn visible_count(&self, selector: &str) -> Result<usize> {
        let value = self.evaluate(&selector::visible_count_script(selector)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn dispatch_click(&self, x: f64, y: f64) -> Result<()> {
        self.conn
            .send(
                "Input.dispatchMouseEvent",
                json!({ "type": "mouseMoved", "x": x, "y": y }),
            )
            .await?;
        for kind in ["mousePressed", "mouseReleased"] {
            self.conn
                .send(
                    "Input.dispatchMouseEvent",
                    json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 }),
                )
                .await?;
        }
        Ok(())
    }

    /// Poll until the document satisfies `state` or `deadline` passes.
    async fn await_document(
        &self,
        state: WaitUntil,
        pending_marker: bool,
        deadline: Instant,
    ) -> Result<()> {
        let snapshot_js = format!(
            "({{ ready: document.readyState, replaced: !window.{NAV_MARKER}, \
             resources: performance.getEntriesByType('resource').length }})"
        );
        let mut last_resources: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            // The old document may be torn down mid-evaluation; treat that
            // as "not ready yet".
            let snapshot = match self.evaluate(&snapshot_js).await {
                Ok(v) => Some(v),
                Err(BrowserError::Script(_)) | Err(BrowserError::Protocol { .. }) => None,
                Err(e) => return Err(e),
            };

            if let Some(snapshot) = snapshot {
                let ready = snapshot.get("ready").and_then(Value::as_str).unwrap_or("");
                let replaced = !pending_marker
                    || snapshot.get("replaced").and_then(Value::as_bool).unwrap_or(false);
                let resources = snapshot.get("resources").and_then(Value::as_u64).unwrap_or(0);

                if last_resources != Some(resources) {
                    last_resources = Some(resources);
                    quiet_since = Instant::now();
                }

                let reached = replaced
                    && match state {
                        WaitUntil::DomContentLoaded => ready == "interactive" || ready == "complete",
                        WaitUntil::Load => ready == "complete",
                        WaitUntil::NetworkIdle => {
                            ready == "complete" && quiet_since.elapsed() >= NETWORK_QUIET
                        }
                    };
                if reached {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "page did not reach {state:?} in time"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, timeout, SelectorState::Visible)
            .await
            .map_err(|e| match e {
                BrowserError::Timeout(_) => BrowserError::ElementNotFound(selector.to_string()),
                other => other,
            })
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
        let deadline = Instant::now() + self.navigation_timeout;
        self.evaluate(&format!("window.{NAV_MARKER} = true")).await?;

        let result = self.conn.send("Page.navigate", json!({ "url": url })).await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: reason.to_string(),
            });
        }
        // Same-document navigations carry no loaderId and keep the marker.
        let cross_document = result.get("loaderId").is_some();

        self.await_document(wait_until, cross_document, deadline)
            .await
            .map_err(|e| match e {
                BrowserError::Timeout(_) => BrowserError::Timeout(format!(
                    "navigating to {url} exceeded {}ms",
                    self.navigation_timeout.as_millis()
                )),
                other => other,
            })
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.wait_visible(selector, self.navigation_timeout).await?;
        self.throttle().await;
        let filled = self.evaluate(&selector::fill_script(selector, value)).await?;
        if filled.as_bool() != Some(true) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.wait_visible(selector, self.navigation_timeout).await?;
        self.throttle().await;
        let point = self.evaluate(&selector::click_point_script(selector)).await?;
        let (Some(x), Some(y)) = (
            point.get("x").and_then(Value::as_f64),
            point.get("y").and_then(Value::as_f64),
        ) else {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        };
        self.dispatch_click(x, y).await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        state: SelectorState,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let matches = match state {
                SelectorState::Visible => self.visible_count(selector).await,
                SelectorState::Attached => self.count(selector).await,
            };
            match matches {
                Ok(n) if n > 0 => return Ok(()),
                Ok(_) => {}
                // Navigation in progress: the context is gone for a moment.
                Err(BrowserError::Protocol { .. }) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "waiting for {selector} ({state:?}) exceeded {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()> {
        self.await_document(state, false, Instant::now() + timeout).await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let value = self.evaluate(&selector::count_script(selector)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn url(&self) -> Result<String> {
        let value = self.evaluate("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}
