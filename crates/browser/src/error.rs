/// Errors raised by a browser engine.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no Chrome/Chromium executable found ({0})")]
    ExecutableNotFound(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no element matches {0}")]
    ElementNotFound(String),

    #[error("protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("page script failed: {0}")]
    Script(String),

    #[error("DevTools connection closed")]
    ConnectionClosed,

    #[error("WebSocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrowserError {
    /// A bounded wait elapsed.  Stage logic treats this differently from
    /// every other fault.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
