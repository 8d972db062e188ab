use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Purchase flow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Target site, selectors and per-stage wait policy for the purchase flow.
///
/// Selectors use the Playwright-style syntax understood by the browser
/// engine: comma-separated alternatives of plain CSS in which any compound
/// may carry `:has-text("...")`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "d_login_url")]
    pub login_url: String,
    #[serde(default = "d_cart_url")]
    pub cart_url: String,
    /// If the page URL still contains this (case-insensitive) after
    /// submitting credentials, the login is treated as failed.
    #[serde(default = "d_login_marker")]
    pub login_marker: String,
    #[serde(default)]
    pub selectors: FlowSelectors,
    #[serde(default)]
    pub timing: FlowTiming,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            login_url: d_login_url(),
            cart_url: d_cart_url(),
            login_marker: d_login_marker(),
            selectors: FlowSelectors::default(),
            timing: FlowTiming::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSelectors {
    #[serde(default = "d_email")]
    pub email: String,
    #[serde(default = "d_password")]
    pub password: String,
    #[serde(default = "d_submit")]
    pub submit: String,
    /// Availability indicators, tried in priority order.
    #[serde(default = "d_add_to_cart")]
    pub add_to_cart: Vec<String>,
    /// Checkout controls, tried in order; the first present is clicked.
    #[serde(default = "d_checkout")]
    pub checkout: Vec<String>,
}

impl Default for FlowSelectors {
    fn default() -> Self {
        Self {
            email: d_email(),
            password: d_password(),
            submit: d_submit(),
            add_to_cart: d_add_to_cart(),
            checkout: d_checkout(),
        }
    }
}

/// Wait ceilings and settle pauses, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowTiming {
    /// Pause after filling each credential field.
    #[serde(default = "d_500")]
    pub fill_pause_ms: u64,
    /// Ceiling for network settlement after submitting the login form.
    #[serde(default = "d_10000")]
    pub login_settle_timeout_ms: u64,
    /// Pause after login settlement before inspecting the URL.
    #[serde(default = "d_2000")]
    pub login_pause_ms: u64,
    /// Ceiling per add-to-cart selector while waiting for a restock.
    #[serde(default = "d_300000")]
    pub availability_timeout_ms: u64,
    #[serde(default = "d_2000")]
    pub add_to_cart_pause_ms: u64,
    #[serde(default = "d_1000")]
    pub cart_pause_ms: u64,
    #[serde(default = "d_2000")]
    pub checkout_pause_ms: u64,
}

impl Default for FlowTiming {
    fn default() -> Self {
        Self {
            fill_pause_ms: 500,
            login_settle_timeout_ms: 10_000,
            login_pause_ms: 2_000,
            availability_timeout_ms: 300_000,
            add_to_cart_pause_ms: 2_000,
            cart_pause_ms: 1_000,
            checkout_pause_ms: 2_000,
        }
    }
}

impl FlowTiming {
    pub fn fill_pause(&self) -> Duration {
        Duration::from_millis(self.fill_pause_ms)
    }
    pub fn login_settle_timeout(&self) -> Duration {
        Duration::from_millis(self.login_settle_timeout_ms)
    }
    pub fn login_pause(&self) -> Duration {
        Duration::from_millis(self.login_pause_ms)
    }
    pub fn availability_timeout(&self) -> Duration {
        Duration::from_millis(self.availability_timeout_ms)
    }
    pub fn add_to_cart_pause(&self) -> Duration {
        Duration::from_millis(self.add_to_cart_pause_ms)
    }
    pub fn cart_pause(&self) -> Duration {
        Duration::from_millis(self.cart_pause_ms)
    }
    pub fn checkout_pause(&self) -> Duration {
        Duration::from_millis(self.checkout_pause_ms)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_login_url() -> String {
    "https://p-bandai.com/us/login".into()
}
fn d_cart_url() -> String {
    "https://p-bandai.com/us/cart".into()
}
fn d_login_marker() -> String {
    "login".into()
}
fn d_email() -> String {
    r#"input[type="email"], input[name="email"]"#.into()
}
fn d_password() -> String {
    r#"input[type="password"], input[name="password"]"#.into()
}
fn d_submit() -> String {
    r#"button[type="submit"], button:has-text("Sign In"), button:has-text("Log In")"#.into()
}
fn d_add_to_cart() -> Vec<String> {
    vec![
        r#"button:has-text("Add to Cart")"#.into(),
        r#"button:has-text("ADD TO CART")"#.into(),
        r#"button[class*="add-to-cart"]"#.into(),
        ".add-to-cart-button".into(),
    ]
}
fn d_checkout() -> Vec<String> {
    vec![
        r#"button:has-text("Checkout")"#.into(),
        r#"button:has-text("CHECKOUT")"#.into(),
        r#"a:has-text("Checkout")"#.into(),
    ]
}
fn d_500() -> u64 {
    500
}
fn d_1000() -> u64 {
    1_000
}
fn d_2000() -> u64 {
    2_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_300000() -> u64 {
    300_000
}
