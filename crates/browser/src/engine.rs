//! Engine-neutral automation traits.
//!
//! The purchase flow only ever talks to these traits, so any engine that
//! can launch a browser, open a page and perform the handful of page
//! operations below can drive it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use cr_domain::config::BrowserConfig;

use crate::error::Result;

/// Options passed to [`BrowserEngine::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Delay before every input action.
    pub slow_mo: Duration,
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub launch_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl LaunchOptions {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            slow_mo: Duration::from_millis(config.slow_mo_ms),
            executable: config.executable.clone(),
            extra_args: config.extra_args.clone(),
            launch_timeout: Duration::from_millis(config.launch_timeout_ms),
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl From<cr_domain::config::ViewportConfig> for Viewport {
    fn from(v: cr_domain::config::ViewportConfig) -> Self {
        Self {
            width: v.width,
            height: v.height,
        }
    }
}

/// Load milestone a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    /// Load complete and no new network requests for 500 ms.
    NetworkIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// Present in the DOM.
    Attached,
    /// Present with a non-empty box and not `visibility: hidden`.
    Visible,
}

/// Launches browsers.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Browser>>;
}

/// A running browser instance.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh page (context + tab) with the given viewport.
    async fn new_page(&self, viewport: Viewport) -> Result<Box<dyn Page>>;

    /// Shut the browser down.  Idempotent.
    async fn close(&self) -> Result<()>;
}

/// A single tab.
///
/// `fill` and `click` wait for their target to become visible (bounded by
/// the navigation timeout) before acting.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<()>;

    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Resolve once `selector` reaches `state`, or fail with
    /// [`BrowserError::Timeout`](crate::BrowserError::Timeout).
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
        state: SelectorState,
    ) -> Result<()>;

    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Current page location.
    async fn url(&self) -> Result<String>;
}
