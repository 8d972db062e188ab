mod browser;
mod flow;
mod server;
mod sessions;

pub use browser::*;
pub use flow::*;
pub use server::*;
pub use sessions::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Config {
    /// Apply process environment overrides (`PORT`, `HEADLESS`).
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup.  Unparseable values are
    /// logged and ignored so a typo never takes the server down.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %raw, "ignoring unparseable PORT"),
            }
        }
        if let Some(raw) = lookup("HEADLESS") {
            self.browser.headless = parse_bool_like(&raw);
        }
    }
}

/// Interpret a boolean-like string: `1`, `true`, `yes`, `on` (any case)
/// are true, everything else is false.
pub fn parse_bool_like(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.stream.heartbeat_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "stream.heartbeat_secs".into(),
                message: "heartbeat interval must be greater than 0".into(),
            });
        }

        if self.browser.viewport.width == 0 || self.browser.viewport.height == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "browser.viewport".into(),
                message: "viewport dimensions must be non-zero".into(),
            });
        }

        for (field, url) in [
            ("flow.login_url", &self.flow.login_url),
            ("flow.cart_url", &self.flow.cart_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: format!("expected an http(s) URL, got {url:?}"),
                });
            }
        }

        for (field, selector) in [
            ("flow.selectors.email", &self.flow.selectors.email),
            ("flow.selectors.password", &self.flow.selectors.password),
            ("flow.selectors.submit", &self.flow.selectors.submit),
        ] {
            if selector.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: field.into(),
                    message: "selector must not be empty".into(),
                });
            }
        }

        // An empty marker is a substring of every URL, so every login
        // would be reported as failed.
        if self.flow.login_marker.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "flow.login_marker".into(),
                message: "login marker must not be empty".into(),
            });
        }

        if self.flow.selectors.add_to_cart.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "flow.selectors.add_to_cart".into(),
                message: "at least one add-to-cart selector is required".into(),
            });
        }

        if self.flow.selectors.checkout.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "flow.selectors.checkout".into(),
                message: "no checkout selectors; checkout will never be started automatically"
                    .into(),
            });
        }

        if self.sessions.retention_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "sessions.retention_secs".into(),
                message: "0 disables eviction; finished sessions are kept for the process lifetime"
                    .into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        errors
    }
}
