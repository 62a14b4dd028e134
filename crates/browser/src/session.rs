//! Chrome session lifecycle.
//!
//! Each session owns a freshly launched Chrome process with a throwaway
//! profile and a CDP connection to its first page target. Sessions are
//! short-lived: one per check cycle, torn down unconditionally at the end.

use super::cdp::CdpClient;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use creneau_core::config::BrowserConfig;
use creneau_core::{Error, Paths, Result};

/// A single browser session with its Chrome process and CDP client.
pub struct BrowserSession {
    /// Label for logs and screenshot file names, e.g. "check" or a user email.
    pub label: String,
    /// Remote debugging port the Chrome process listens on.
    pub debug_port: u16,
    chrome_process: Child,
    pub cdp: Arc<CdpClient>,
    user_data_dir: PathBuf,
    logs_dir: PathBuf,
    /// Task that auto-accepts JavaScript dialogs as they open.
    dialog_task: tokio::task::JoinHandle<()>,
    closed: bool,
}

impl BrowserSession {
    /// Launch Chrome and connect to its first page target.
    pub async fn launch(config: &BrowserConfig, paths: &Paths, label: &str) -> Result<Self> {
        let browser_path = find_chrome_binary()
            .ok_or_else(|| Error::Session("Chrome not found, please install it".to_string()))?;

        let debug_port = find_free_port().await?;

        // One throwaway profile per launch; removed again on close.
        let user_data_dir = paths.browser_dir().join(format!("{}-{}", label, debug_port));
        std::fs::create_dir_all(&user_data_dir)?;

        let args = build_chrome_args(config, debug_port, &user_data_dir);

        info!(
            label = label,
            port = debug_port,
            headless = config.headless,
            "Launching browser"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Session(format!("failed to launch Chrome: {}", e)))?;

        wait_for_cdp_ready(debug_port, 15).await?;

        // Connect to the page target (not browser-level) so Page.enable etc. work
        let page_ws_url = get_page_ws_url(debug_port).await?;
        let command_timeout = Duration::from_millis(config.action_timeout_ms);
        let cdp = Arc::new(CdpClient::connect(&page_ws_url, command_timeout).await?);

        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("Network").await?;

        cdp.set_viewport(config.viewport_width, config.viewport_height)
            .await?;
        cdp.set_locale(&config.locale).await?;
        cdp.set_timezone(&config.timezone).await?;

        let dialog_task = spawn_dialog_acceptor(cdp.clone()).await;

        info!(label = label, ws_url = %page_ws_url, "CDP connection established");

        Ok(Self {
            label: label.to_string(),
            debug_port,
            chrome_process: child,
            cdp,
            user_data_dir,
            logs_dir: paths.logs_dir(),
            dialog_task,
            closed: false,
        })
    }

    /// Capture a screenshot into the logs directory.
    ///
    /// Diagnostics only: failures are logged and swallowed so a broken page
    /// never masks the error that triggered the capture.
    pub async fn screenshot(&self, prefix: &str) -> Option<PathBuf> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.logs_dir.join(format!("{}_{}.png", prefix, timestamp));

        let data = match self.cdp.screenshot().await {
            Ok(d) => d,
            Err(e) => {
                warn!("Screenshot capture failed: {}", e);
                return None;
            }
        };

        use base64::Engine;
        let bytes = match base64::engine::general_purpose::STANDARD.decode(&data) {
            Ok(b) => b,
            Err(e) => {
                warn!("Screenshot decode failed: {}", e);
                return None;
            }
        };

        if let Err(e) = std::fs::write(&path, bytes) {
            warn!("Screenshot write failed: {}", e);
            return None;
        }
        debug!(path = %path.display(), "Screenshot saved");
        Some(path)
    }

    /// Close the browser session. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.dialog_task.abort();
        // Graceful close via CDP first, then make sure the process is gone
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.chrome_process.kill().await;
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("Profile cleanup failed: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.dialog_task.abort();
        // Best-effort kill on drop
        let _ = self.chrome_process.start_kill();
    }
}

/// Accept every JavaScript dialog the moment it opens.
///
/// The booking flow triggers confirm() prompts; without this the page
/// would hang waiting for a click that never comes.
async fn spawn_dialog_acceptor(cdp: Arc<CdpClient>) -> tokio::task::JoinHandle<()> {
    let mut events = cdp.subscribe_event("Page.javascriptDialogOpening").await;
    tokio::spawn(async move {
        while let Some(params) = events.recv().await {
            let message = params
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            debug!(message = message, "Auto-accepting dialog");
            if let Err(e) = cdp.handle_dialog(true).await {
                warn!("Failed to accept dialog: {}", e);
            }
        }
    })
}

fn build_chrome_args(config: &BrowserConfig, debug_port: u16, user_data_dir: &std::path::Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        format!("--lang={}", config.locale),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--safebrowsing-disable-auto-update".to_string(),
        "--password-store=basic".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.push(format!(
        "--window-size={},{}",
        config.viewport_width, config.viewport_height
    ));
    args.push("about:blank".to_string());
    args
}

/// Find a Chrome/Chromium binary on the system.
pub fn find_chrome_binary() -> Option<String> {
    let candidates: Vec<&str> = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok()
        {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Find a free TCP port.
async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Session(format!("failed to bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Session(format!("failed to get local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}

/// Wait for Chrome's CDP endpoint to become available.
/// Polls /json/version until it responds, up to `timeout_secs`.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "Chrome CDP not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Connect to the first page target's WebSocket URL.
/// Chrome exposes /json/list which lists all targets (pages).
/// Retries a few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Session(
        "no page target found after retries".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use creneau_core::config::BrowserConfig;

    #[test]
    fn test_chrome_args_headless() {
        let config = BrowserConfig::default();
        let dir = std::path::Path::new("/tmp/profile");
        let args = build_chrome_args(&config, 9222, dir);
        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--lang=fr-FR".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
    }

    #[test]
    fn test_chrome_args_headed() {
        let mut config = BrowserConfig::default();
        config.headless = false;
        let dir = std::path::Path::new("/tmp/profile");
        let args = build_chrome_args(&config, 9222, dir);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }
}
