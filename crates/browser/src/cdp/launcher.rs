//! Spawn Chrome with remote debugging and hand out pages.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::connection::CdpConnection;
use super::finder::find_chrome_executable;
use super::page::CdpPage;
use crate::engine::{Browser, BrowserEngine, LaunchOptions, Page, Viewport};
use crate::error::{BrowserError, Result};

/// Per-command ceiling on the DevTools socket.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// `/json/version` response subset.
#[derive(Debug, Deserialize)]
struct VersionInfo {
    #[serde(rename = "Browser")]
    browser: Option<String>,
}

/// `/json/new` response subset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    id: String,
    web_socket_debugger_url: String,
}

/// Launches a local Chrome/Chromium per call.
#[derive(Debug, Default, Clone)]
pub struct CdpEngine;

impl CdpEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserEngine for CdpEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn Browser>> {
        let executable = match &options.executable {
            Some(path) => path.clone(),
            None => find_chrome_executable().ok_or_else(|| {
                BrowserError::ExecutableNotFound(
                    "install Chrome/Chromium or set browser.executable".into(),
                )
            })?,
        };

        let port = free_port()?;
        let profile_dir = std::env::temp_dir().join(format!("cartrunner-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&profile_dir).await?;

        let mut args = vec![
            format!("--remote-debugging-port={port}"),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if options.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(options.extra_args.iter().cloned());
        args.push("about:blank".to_string());

        tracing::info!(
            executable = %executable.display(),
            port,
            headless = options.headless,
            "launching browser"
        );

        let spawned = Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut guard = LaunchGuard {
            child: None,
            profile_dir: Some(profile_dir),
        };
        match spawned {
            Ok(child) => guard.child = Some(child),
            Err(e) => {
                return Err(BrowserError::Launch(format!(
                    "failed to start {}: {e}",
                    executable.display()
                )))
            }
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let deadline = Instant::now() + options.launch_timeout;
        loop {
            tokio::time::sleep(READY_POLL_INTERVAL).await;

            if let Some(status) = guard.exited() {
                return Err(BrowserError::Launch(format!(
                    "browser exited before the debugging endpoint came up ({status})"
                )));
            }

            let unreachable = match fetch_version(&http, port).await {
                Ok(info) => {
                    tracing::info!(
                        port,
                        browser = info.browser.as_deref().unwrap_or("unknown"),
                        "browser debugging endpoint ready"
                    );
                    break;
                }
                Err(e) => e,
            };

            if Instant::now() >= deadline {
                return Err(BrowserError::Launch(format!(
                    "debugging endpoint on port {port} not available after {}ms: {unreachable}",
                    options.launch_timeout.as_millis()
                )));
            }
        }

        let (child, profile_dir) = guard
            .disarm()
            .ok_or_else(|| BrowserError::Launch("browser process handle lost".into()))?;
        Ok(Box::new(CdpBrowser {
            child: Mutex::new(Some(child)),
            port,
            profile_dir,
            http,
            slow_mo: options.slow_mo,
            navigation_timeout: options.navigation_timeout,
        }))
    }
}

async fn fetch_version(http: &reqwest::Client, port: u16) -> Result<VersionInfo> {
    let response = http
        .get(format!("http://127.0.0.1:{port}/json/version"))
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

/// Ask the OS for an unused local port.
fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Kills the half-started process and removes its profile if launch is
/// abandoned, whether by error or by the caller dropping the future.
struct LaunchGuard {
    child: Option<Child>,
    profile_dir: Option<PathBuf>,
}

impl LaunchGuard {
    fn exited(&mut self) -> Option<std::process::ExitStatus> {
        self.child.as_mut()?.try_wait().ok().flatten()
    }

    fn disarm(mut self) -> Option<(Child, PathBuf)> {
        Some((self.child.take()?, self.profile_dir.take()?))
    }
}

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
        if let Some(dir) = self.profile_dir.take() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}

/// A browser process launched by [`CdpEngine`].
///
/// Dropping this does **not** stop the process; only [`Browser::close`]
/// does.  A browser left open after a successful run stays usable.
pub struct CdpBrowser {
    child: Mutex<Option<Child>>,
    port: u16,
    profile_dir: PathBuf,
    http: reqwest::Client,
    slow_mo: Duration,
    navigation_timeout: Duration,
}

#[async_trait]
impl Browser for CdpBrowser {
    async fn new_page(&self, viewport: Viewport) -> Result<Box<dyn Page>> {
        // Chrome requires PUT for /json/new.
        let target: TargetInfo = self
            .http
            .put(format!("http://127.0.0.1:{}/json/new?about:blank", self.port))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(target_id = %target.id, "opened page target");

        let conn = CdpConnection::connect(&target.web_socket_debugger_url, COMMAND_TIMEOUT).await?;
        conn.send("Page.enable", serde_json::json!({})).await?;
        conn.send("Runtime.enable", serde_json::json!({})).await?;
        conn.send(
            "Emulation.setDeviceMetricsOverride",
            serde_json::json!({
                "width": viewport.width,
                "height": viewport.height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;

        Ok(Box::new(CdpPage::new(conn, self.slow_mo, self.navigation_timeout)))
    }

    async fn close(&self) -> Result<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "failed to kill browser process");
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            tracing::debug!(error = %e, dir = %self.profile_dir.display(), "profile cleanup failed");
        }
        tracing::info!(port = self.port, "browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_domain::config::BrowserConfig;

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_executable_is_a_launch_error() {
        let mut options = LaunchOptions::from_config(&BrowserConfig::default());
        options.executable = Some(PathBuf::from("/nonexistent/cartrunner/chrome"));
        match CdpEngine::new().launch(&options).await {
            Err(BrowserError::Launch(msg)) => assert!(msg.contains("/nonexistent/cartrunner/chrome")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("launch should fail"),
        }
    }

    /// An executable that starts but never opens the debugging port.
    #[cfg(unix)]
    #[tokio::test]
    async fn silent_browser_reports_the_last_connect_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut options = LaunchOptions::from_config(&BrowserConfig::default());
        options.executable = Some(fake);
        options.launch_timeout = Duration::from_millis(300);
        match CdpEngine::new().launch(&options).await {
            Err(BrowserError::Launch(msg)) => {
                assert!(msg.contains("not available after 300ms: "), "{msg}");
                assert!(!msg.ends_with(": "), "{msg}");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("launch should time out"),
        }
    }
}
