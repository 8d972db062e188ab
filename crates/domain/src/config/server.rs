use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_5000")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub auth: BasicAuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: d_host(),
            cors: CorsConfig::default(),
            auth: BasicAuthConfig::default(),
        }
    }
}

/// HTTP Basic credentials gating every route.
///
/// Only the *names* of the environment variables live in the config file;
/// the values are read once at startup.  When either variable is unset or
/// empty the gate is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    #[serde(default = "d_user_env")]
    pub user_env: String,
    #[serde(default = "d_password_env")]
    pub password_env: String,
    #[serde(default = "d_realm")]
    pub realm: String,
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self {
            user_env: d_user_env(),
            password_env: d_password_env(),
            realm: d_realm(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    /// Defaults to localhost-only.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Live log stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Seconds without an event before a `{"ping": true}` record is sent.
    #[serde(default = "d_30")]
    pub heartbeat_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { heartbeat_secs: 30 }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_5000() -> u16 {
    5000
}
fn d_30() -> u64 {
    30
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:*".into(),
        "http://127.0.0.1:*".into(),
    ]
}
fn d_user_env() -> String {
    "BASIC_AUTH_USER".into()
}
fn d_password_env() -> String {
    "BASIC_AUTH_PASSWORD".into()
}
fn d_realm() -> String {
    "Login Required".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_parses_partial_toml() {
        let toml_str = r#"
            port = 8080
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.auth.user_env, "BASIC_AUTH_USER");
    }

    #[test]
    fn server_config_empty_toml_uses_all_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.auth.password_env, "BASIC_AUTH_PASSWORD");
        assert_eq!(cfg.auth.realm, "Login Required");
    }

    #[test]
    fn auth_env_names_are_overridable() {
        let toml_str = r#"
            [auth]
            user_env = "CR_USER"
            password_env = "CR_PASS"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.auth.user_env, "CR_USER");
        assert_eq!(cfg.auth.password_env, "CR_PASS");
        assert_eq!(cfg.auth.realm, "Login Required");
    }

    #[test]
    fn stream_config_defaults_to_thirty_seconds() {
        let cfg: StreamConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.heartbeat_secs, 30);
    }
}
