//! In-memory engine that plays back a scripted site for worker and API
//! tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cr_browser::{
    Browser, BrowserEngine, BrowserError, LaunchOptions, Page, SelectorState, Viewport, WaitUntil,
};

/// How the fake site behaves. Shared by every browser and page the engine
/// hands out so tests can inspect what happened.
#[derive(Default)]
pub struct Script {
    /// Selectors that are (or become) visible.
    pub visible: HashSet<String>,
    /// `count()` results; anything absent counts zero.
    pub counts: HashMap<String, usize>,
    /// Clicking the key selector moves the page to the value URL.
    pub redirects: HashMap<String, String>,
    /// Launch fails with this message.
    pub launch_error: Option<String>,
    /// Clicking this selector panics.
    pub panic_on_click: Option<String>,
    /// Clicking this selector fails.
    pub failing_clicks: HashSet<String>,

    pub launches: AtomicUsize,
    pub closed: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl Script {
    pub fn visible(mut self, selector: impl Into<String>) -> Self {
        self.visible.insert(selector.into());
        self
    }

    pub fn count(mut self, selector: impl Into<String>, n: usize) -> Self {
        self.counts.insert(selector.into(), n);
        self
    }

    pub fn redirect(mut self, selector: impl Into<String>, url: impl Into<String>) -> Self {
        self.redirects.insert(selector.into(), url.into());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[derive(Clone)]
pub struct ScriptedEngine {
    pub script: Arc<Script>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
        }
    }
}

#[async_trait]
impl BrowserEngine for ScriptedEngine {
    async fn launch(&self, options: &LaunchOptions) -> cr_browser::Result<Box<dyn Browser>> {
        self.script.launches.fetch_add(1, Ordering::SeqCst);
        self.script
            .record(format!("launch headless={}", options.headless));
        if let Some(msg) = &self.script.launch_error {
            return Err(BrowserError::Launch(msg.clone()));
        }
        Ok(Box::new(ScriptedBrowser {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedBrowser {
    script: Arc<Script>,
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_page(&self, viewport: Viewport) -> cr_browser::Result<Box<dyn Page>> {
        self.script
            .record(format!("new_page {}x{}", viewport.width, viewport.height));
        Ok(Box::new(ScriptedPage {
            script: self.script.clone(),
            url: Mutex::new("about:blank".into()),
        }))
    }

    async fn close(&self) -> cr_browser::Result<()> {
        self.script.closed.store(true, Ordering::SeqCst);
        self.script.record("close".into());
        Ok(())
    }
}

struct ScriptedPage {
    script: Arc<Script>,
    url: Mutex<String>,
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str, _wait_until: WaitUntil) -> cr_browser::Result<()> {
        self.script.record(format!("goto {url}"));
        *self.url.lock() = url.to_string();
        Ok(())
    }

    async fn fill(&self, selector: &str, _value: &str) -> cr_browser::Result<()> {
        self.script.record(format!("fill {selector}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> cr_browser::Result<()> {
        self.script.record(format!("click {selector}"));
        if self.script.panic_on_click.as_deref() == Some(selector) {
            panic!("scripted panic on {selector}");
        }
        if self.script.failing_clicks.contains(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        if let Some(next) = self.script.redirects.get(selector) {
            *self.url.lock() = next.clone();
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        _state: SelectorState,
    ) -> cr_browser::Result<()> {
        self.script.record(format!("wait {selector}"));
        if self.script.visible.contains(selector) {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(BrowserError::Timeout(format!("{selector} not visible")))
    }

    async fn wait_for_load_state(
        &self,
        _state: WaitUntil,
        timeout: Duration,
    ) -> cr_browser::Result<()> {
        // The post-login settle never goes idle, like a site with polling.
        tokio::time::sleep(timeout).await;
        Err(BrowserError::Timeout("network never idle".into()))
    }

    async fn count(&self, selector: &str) -> cr_browser::Result<usize> {
        Ok(self.script.counts.get(selector).copied().unwrap_or(0))
    }

    async fn url(&self) -> cr_browser::Result<String> {
        Ok(self.url.lock().clone())
    }
}
