//! HTTP Basic authentication middleware.
//!
//! Reads the env vars named by `config.server.auth` (default
//! `BASIC_AUTH_USER` / `BASIC_AUTH_PASSWORD`) **once at startup** and caches
//! their SHA-256 digests in `AppState`.
//! - If both are set and non-empty, every request must carry matching
//!   `Authorization: Basic ...` credentials.
//! - If either is unset or empty, the server logs a warning once and the
//!   gate is a no-op.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use cr_domain::config::BasicAuthConfig;

use crate::state::AppState;

/// Expected credentials, held only as digests.
pub struct BasicAuth {
    user_hash: [u8; 32],
    password_hash: [u8; 32],
    challenge: HeaderValue,
}

impl BasicAuth {
    pub fn new(user: &str, password: &str, realm: &str) -> Self {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Login Required\""));
        Self {
            user_hash: Sha256::digest(user.as_bytes()).into(),
            password_hash: Sha256::digest(password.as_bytes()).into(),
            challenge,
        }
    }

    /// Build from the configured env var names; `None` when either value is
    /// missing or empty.
    pub fn from_env(config: &BasicAuthConfig) -> Option<Self> {
        Self::from_lookup(config, |k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(config: &BasicAuthConfig, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = lookup(&config.user_env).filter(|v| !v.is_empty())?;
        let password = lookup(&config.password_env).filter(|v| !v.is_empty())?;
        Some(Self::new(&user, &password, &config.realm))
    }

    /// Compare both halves in constant time. Hashing first hides the
    /// expected lengths.
    pub fn verify(&self, user: &str, password: &str) -> bool {
        let user_hash = Sha256::digest(user.as_bytes());
        let password_hash = Sha256::digest(password.as_bytes());
        let user_ok = user_hash.ct_eq(self.user_hash.as_slice());
        let password_ok = password_hash.ct_eq(self.password_hash.as_slice());
        bool::from(user_ok & password_ok)
    }
}

/// Axum middleware enforcing Basic auth on every route. Attach via
/// `axum::middleware::from_fn_with_state`.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth) = state.basic_auth.as_deref() else {
        return next.run(req).await;
    };

    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic)
        .is_some_and(|(user, password)| auth.verify(&user, &password));

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, auth.challenge.clone())],
            "Authentication required",
        )
            .into_response();
    }

    next.run(req).await
}

/// Split an `Authorization: Basic <base64(user:password)>` value.
fn decode_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
