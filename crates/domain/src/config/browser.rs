use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browser launch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run without a visible window.  Overridden by `HEADLESS`.
    #[serde(default = "d_true")]
    pub headless: bool,
    /// Delay inserted before every input action, in milliseconds.
    #[serde(default = "d_100")]
    pub slow_mo_ms: u64,
    #[serde(default)]
    pub viewport: ViewportConfig,
    /// Explicit Chrome/Chromium binary.  Discovered on PATH when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Extra command-line flags passed to the browser.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// How long to wait for the DevTools endpoint after spawning.
    #[serde(default = "d_15000")]
    pub launch_timeout_ms: u64,
    /// Ceiling for a single `goto` to settle.
    #[serde(default = "d_30000")]
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            slow_mo_ms: 100,
            viewport: ViewportConfig::default(),
            executable: None,
            extra_args: Vec::new(),
            launch_timeout_ms: 15_000,
            navigation_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "d_1280")]
    pub width: u32,
    #[serde(default = "d_720")]
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_100() -> u64 {
    100
}
fn d_1280() -> u32 {
    1280
}
fn d_720() -> u32 {
    720
}
fn d_15000() -> u64 {
    15_000
}
fn d_30000() -> u64 {
    30_000
}
