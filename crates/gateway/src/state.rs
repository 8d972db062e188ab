use std::sync::Arc;

use cr_browser::BrowserEngine;
use cr_domain::config::Config;
use cr_sessions::SessionRegistry;
use tokio_util::task::TaskTracker;

use crate::api::auth::BasicAuth;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    /// Engine every purchase worker launches its browser through.
    pub engine: Arc<dyn BrowserEngine>,
    /// Basic-auth credentials read once at startup. `None` disables the
    /// gate.
    pub basic_auth: Option<Arc<BasicAuth>>,
    /// Every spawned purchase worker, so shutdown can wait for them.
    pub workers: TaskTracker,
}
