//! Chromium rendering engine over the Chrome DevTools Protocol.
//!
//! This module provides [`ChromiumLauncher`], the production
//! [`EngineLauncher`] implementation. It resolves a Chromium executable
//! (configuration override, well-known installation paths, `which`, or a
//! managed download), launches it headless with hardened flags, and wraps
//! the connection in [`ChromiumEngine`].
//!
//! # Disconnect Detection
//!
//! `chromiumoxide` hands back an event [`Handler`] alongside the browser;
//! the handler stream must be drained for the connection to make progress.
//! The engine drains it on a background task, and the stream ending is the
//! definitive crash/disconnect signal: the task flips the connectivity
//! flag and bumps the disconnect generation counter, waking every
//! subscriber. No polling is involved.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::error::{RenderPoolError, Result};

use super::{EngineLauncher, ExportSettings, RenderEngine, RenderPage};

/// Blank document used for liveness probes and page resets.
pub const BLANK_DOCUMENT: &str = "<html><head></head><body></body></html>";

// ============================================================================
// Executable Resolution
// ============================================================================

/// Well-known Chromium installation paths by platform.
fn well_known_paths() -> Vec<&'static str> {
    if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
            r"C:\Program Files (x86)\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    }
}

/// Find a Chromium executable on the system.
///
/// Checks the configured override first, then well-known installation
/// paths, then the `which` command on Unix systems.
///
/// # Errors
///
/// Returns [`RenderPoolError::Init`] if an override is configured but
/// points to a non-existent file, or if no executable is found anywhere.
pub fn find_chromium_executable(override_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            log::info!("Using configured Chromium executable: {}", path.display());
            return Ok(path.clone());
        }
        // An explicit override that is wrong is a configuration fault,
        // not something to silently fall through.
        return Err(RenderPoolError::Init(format!(
            "configured executable path does not exist: {}",
            path.display()
        )));
    }

    for path_str in well_known_paths() {
        let path = PathBuf::from(path_str);
        if path.exists() {
            log::info!("Found Chromium at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            let output = Command::new("which").arg(cmd).output();
            if let Ok(output) = output {
                if output.status.success() {
                    let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path_str.is_empty() {
                        let path = PathBuf::from(path_str);
                        log::info!("Found Chromium via 'which': {}", path.display());
                        return Ok(path);
                    }
                }
            }
        }
    }

    Err(RenderPoolError::Init(
        "no Chromium executable found on this system".to_string(),
    ))
}

/// Download a managed Chromium build and return its executable path.
///
/// Used as the last resort when no system executable is found. The build
/// is cached, so subsequent launches skip the download.
pub async fn download_managed_chromium() -> Result<PathBuf> {
    log::info!("No system Chromium found, downloading a managed build...");

    let cache_dir = std::env::temp_dir().join("pagepress-chromium");
    std::fs::create_dir_all(&cache_dir)
        .map_err(|e| RenderPoolError::Init(format!("failed to create download cache: {e}")))?;

    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .map_err(|e| RenderPoolError::Init(format!("failed to build fetcher options: {e}")))?;

    let fetcher = BrowserFetcher::new(options);
    let revision_info = fetcher
        .fetch()
        .await
        .map_err(|e| RenderPoolError::Init(format!("failed to download Chromium: {e}")))?;

    log::info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );

    Ok(revision_info.executable_path)
}

// ============================================================================
// Launcher
// ============================================================================

/// Launches headless Chromium processes.
///
/// # Example
///
/// ```rust,ignore
/// use pagepress::engine::chromium::ChromiumLauncher;
///
/// let launcher = ChromiumLauncher::new();
/// let engine = launcher.launch(&config).await?;
/// ```
#[derive(Debug, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    /// Create a launcher. Executable resolution happens at launch time.
    pub fn new() -> Self {
        Self
    }

    /// Build the hardened headless launch configuration.
    fn build_browser_config(
        executable: PathBuf,
        config: &PoolConfig,
    ) -> std::result::Result<BrowserConfig, String> {
        BrowserConfig::builder()
            .chrome_executable(executable)
            .headless_mode(HeadlessMode::New)
            .window_size(1280, 1024)
            .request_timeout(config.navigation_timeout)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-breakpad")
            .arg("--disable-hang-monitor")
            .arg("--disable-ipc-flooding-protection")
            .arg("--disable-prompt-on-repost")
            .arg("--metrics-recording-only")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .build()
    }
}

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self, config: &PoolConfig) -> Result<Arc<dyn RenderEngine>> {
        let executable = match find_chromium_executable(config.executable_path.as_ref()) {
            Ok(path) => path,
            // An explicit override failing is terminal; only auto-detection
            // falls back to the managed download.
            Err(e) if config.executable_path.is_some() => return Err(e),
            Err(_) => download_managed_chromium().await?,
        };

        let browser_config = Self::build_browser_config(executable, config)
            .map_err(|e| RenderPoolError::Init(format!("invalid launch configuration: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderPoolError::Init(format!("failed to launch Chromium: {e}")))?;

        let connected = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(AtomicBool::new(false));
        let (disconnect_tx, _) = watch::channel(0u64);
        let disconnect_tx = Arc::new(disconnect_tx);

        // The handler stream must be drained for the CDP connection to make
        // progress; its termination is the disconnect signal.
        let task_connected = Arc::clone(&connected);
        let task_closing = Arc::clone(&closing);
        let task_tx = Arc::clone(&disconnect_tx);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Chromium handler event error: {e}");
                }
            }
            task_connected.store(false, Ordering::SeqCst);
            if task_closing.load(Ordering::SeqCst) {
                log::info!("Chromium event stream ended during shutdown");
            } else {
                log::warn!("Chromium event stream ended, process disconnected");
                task_tx.send_modify(|generation| *generation += 1);
            }
        });

        log::info!("Chromium launched and connected");

        Ok(Arc::new(ChromiumEngine {
            browser: Mutex::new(browser),
            connected,
            closing,
            disconnect_tx,
            handler_task,
        }))
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A connected headless Chromium process.
///
/// Created by [`ChromiumLauncher::launch`]. Holds the CDP connection, the
/// connectivity flag maintained by the handler task, and the disconnect
/// broadcast channel.
pub struct ChromiumEngine {
    // close() and wait() need exclusive access; everything else is short
    // lock holds around an async call.
    browser: Mutex<Browser>,
    connected: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    disconnect_tx: Arc<watch::Sender<u64>>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn new_page(&self) -> Result<Arc<dyn RenderPage>> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderPoolError::PageCorrupted(format!("page creation failed: {e}")))?;

        log::debug!("Created new Chromium page");
        Ok(Arc::new(ChromiumPage { page }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn version(&self) -> Result<String> {
        let browser = self.browser.lock().await;
        let version = browser
            .version()
            .await
            .map_err(|_| RenderPoolError::BrowserUnavailable)?;
        Ok(version.product)
    }

    fn subscribe_disconnect(&self) -> watch::Receiver<u64> {
        self.disconnect_tx.subscribe()
    }

    async fn close(&self) -> Result<()> {
        self.closing.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            log::warn!("Error closing Chromium: {e}");
            let _ = browser.kill().await;
        }
        if let Err(e) = browser.wait().await {
            log::debug!("Error waiting for Chromium exit: {e}");
        }

        log::info!("Chromium process stopped");
        Ok(())
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        self.handler_task.abort();
    }
}

// ============================================================================
// Page
// ============================================================================

/// A single Chromium tab.
struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl RenderPage for ChromiumPage {
    async fn set_content(&self, html: &str) -> Result<()> {
        self.page
            .set_content(html)
            .await
            .map_err(|e| RenderPoolError::PageCorrupted(format!("failed to load content: {e}")))?;
        Ok(())
    }

    async fn export_pdf(&self, settings: &ExportSettings) -> Result<Vec<u8>> {
        let params = PrintToPdfParams {
            print_background: Some(settings.print_background),
            paper_width: Some(settings.paper_width_in),
            paper_height: Some(settings.paper_height_in),
            margin_top: Some(settings.margin_in),
            margin_bottom: Some(settings.margin_in),
            margin_left: Some(settings.margin_in),
            margin_right: Some(settings.margin_in),
            ..Default::default()
        };

        let bytes = self
            .page
            .pdf(params)
            .await
            .map_err(|e| RenderPoolError::PageCorrupted(format!("PDF export failed: {e}")))?;

        Ok(bytes)
    }

    async fn evaluate(&self, expression: &str) -> Result<String> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| RenderPoolError::PageCorrupted(format!("evaluate failed: {e}")))?;

        result
            .into_value::<String>()
            .map_err(|e| RenderPoolError::PageCorrupted(format!("evaluate returned non-string: {e}")))
    }

    async fn is_alive(&self) -> bool {
        self.page.evaluate("'ok'").await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        // Page is internally reference counted; close() consumes a clone.
        if let Err(e) = self.page.clone().close().await {
            log::debug!("Error closing page (may already be gone): {e}");
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
