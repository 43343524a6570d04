//! Mock rendering engine for testing.
//!
//! This module provides a scriptable implementation of [`EngineLauncher`],
//! [`RenderEngine`], and [`RenderPage`] useful for testing pool behavior
//! without requiring Chromium to be installed.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Scripting
//!
//! The launcher is a cloneable handle to a shared script; tests keep a
//! clone to steer and observe the engine after it has been moved into a
//! manager:
//!
//! ```rust,ignore
//! use pagepress::engine::mock::MockLauncher;
//!
//! let launcher = MockLauncher::new();
//! let script = launcher.clone();
//!
//! // Move `launcher` into a manager, then from the test:
//! script.fail_next_readiness(1);      // one corrupted page
//! script.set_render_delay(Duration::from_millis(100));
//! script.trigger_disconnect();        // simulate a crash
//! assert_eq!(script.pages_created(), 3);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::PoolConfig;
use crate::error::{RenderPoolError, Result};

use super::{EngineLauncher, ExportSettings, RenderEngine, RenderPage};

/// Shared scriptable state behind a [`MockLauncher`] and every engine and
/// page it produces.
struct MockScript {
    connected: AtomicBool,
    // Bumped per successful launch; pages die with their epoch.
    epoch: AtomicUsize,
    launch_attempts: AtomicUsize,
    fail_launches: AtomicUsize,
    pages_created: AtomicUsize,
    pages_closed: AtomicUsize,
    fail_page_creations: AtomicUsize,
    page_creation_delay_ms: AtomicU64,
    bad_readiness_remaining: AtomicUsize,
    render_delay_ms: AtomicU64,
    renders_completed: AtomicUsize,
    renders_in_flight: AtomicUsize,
    peak_concurrent_renders: AtomicUsize,
    disconnect_tx: watch::Sender<u64>,
}

/// Scriptable mock launcher for testing without Chromium.
///
/// Cloning yields another handle to the same script, so tests can keep
/// control after moving a clone into a pool or manager.
///
/// # Thread Safety
///
/// All state is tracked with atomics; the handle is `Send + Sync`.
#[derive(Clone)]
pub struct MockLauncher {
    script: Arc<MockScript>,
}

impl MockLauncher {
    /// Create a mock launcher whose launches and renders always succeed.
    pub fn new() -> Self {
        let (disconnect_tx, _) = watch::channel(0u64);
        Self {
            script: Arc::new(MockScript {
                connected: AtomicBool::new(false),
                epoch: AtomicUsize::new(0),
                launch_attempts: AtomicUsize::new(0),
                fail_launches: AtomicUsize::new(0),
                pages_created: AtomicUsize::new(0),
                pages_closed: AtomicUsize::new(0),
                fail_page_creations: AtomicUsize::new(0),
                page_creation_delay_ms: AtomicU64::new(0),
                bad_readiness_remaining: AtomicUsize::new(0),
                render_delay_ms: AtomicU64::new(0),
                renders_completed: AtomicUsize::new(0),
                renders_in_flight: AtomicUsize::new(0),
                peak_concurrent_renders: AtomicUsize::new(0),
                disconnect_tx,
            }),
        }
    }

    /// Create a mock launcher whose next `n` launch attempts fail.
    ///
    /// Useful for exercising launch retry and recovery backoff paths.
    pub fn fail_launches(n: usize) -> Self {
        let launcher = Self::new();
        launcher.script.fail_launches.store(n, Ordering::SeqCst);
        launcher
    }

    /// Make the next `n` launch attempts fail.
    ///
    /// Same script as [`fail_launches`](Self::fail_launches), settable
    /// after the launcher has been handed off.
    pub fn fail_next_launches(&self, n: usize) {
        self.script.fail_launches.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` page creations fail.
    pub fn fail_page_creations(&self, n: usize) {
        self.script.fail_page_creations.store(n, Ordering::SeqCst);
    }

    /// Delay every page creation by the given duration.
    ///
    /// Makes `new_page` suspend mid-call, which is how tests interleave
    /// page creation with releases and reseeds.
    pub fn set_page_creation_delay(&self, delay: Duration) {
        self.script
            .page_creation_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make the next `n` readiness probes report an unready document.
    ///
    /// Each affected probe answers `"loading"` instead of `"complete"`,
    /// which the executor treats as a corrupted page.
    pub fn fail_next_readiness(&self, n: usize) {
        self.script.bad_readiness_remaining.store(n, Ordering::SeqCst);
    }

    /// Delay every PDF export by the given duration.
    ///
    /// Holds pages checked out, which is how concurrency-ceiling tests
    /// keep the pool busy.
    pub fn set_render_delay(&self, delay: Duration) {
        self.script
            .render_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Simulate a browser process crash.
    ///
    /// Marks the engine disconnected (every page dies with it) and bumps
    /// the disconnect generation counter, waking subscribers.
    pub fn trigger_disconnect(&self) {
        log::debug!("MockLauncher: Triggering disconnect");
        self.script.connected.store(false, Ordering::SeqCst);
        self.script
            .disconnect_tx
            .send_modify(|generation| *generation += 1);
    }

    /// Number of launch attempts observed (successful or not).
    pub fn launch_attempts(&self) -> usize {
        self.script.launch_attempts.load(Ordering::SeqCst)
    }

    /// Number of pages created across all launches.
    pub fn pages_created(&self) -> usize {
        self.script.pages_created.load(Ordering::SeqCst)
    }

    /// Number of pages closed across all launches.
    pub fn pages_closed(&self) -> usize {
        self.script.pages_closed.load(Ordering::SeqCst)
    }

    /// Number of PDF exports completed.
    pub fn renders_completed(&self) -> usize {
        self.script.renders_completed.load(Ordering::SeqCst)
    }

    /// Highest number of exports observed running at the same time.
    ///
    /// The direct witness for concurrency-ceiling assertions.
    pub fn peak_concurrent_renders(&self) -> usize {
        self.script.peak_concurrent_renders.load(Ordering::SeqCst)
    }
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLauncher")
            .field(
                "launch_attempts",
                &self.script.launch_attempts.load(Ordering::SeqCst),
            )
            .field(
                "pages_created",
                &self.script.pages_created.load(Ordering::SeqCst),
            )
            .field("connected", &self.script.connected.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl EngineLauncher for MockLauncher {
    async fn launch(&self, _config: &PoolConfig) -> Result<Arc<dyn RenderEngine>> {
        self.script.launch_attempts.fetch_add(1, Ordering::SeqCst);

        // fetch_update keeps concurrent launch attempts from double
        // counting a scripted failure.
        let should_fail = self
            .script
            .fail_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();

        if should_fail {
            log::debug!("MockLauncher: Returning scripted launch failure");
            return Err(RenderPoolError::Init("scripted launch failure".to_string()));
        }

        let epoch = self.script.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.connected.store(true, Ordering::SeqCst);
        log::debug!(
            "MockLauncher: Launch #{} succeeded (epoch {epoch})",
            self.script.launch_attempts.load(Ordering::SeqCst)
        );

        Ok(Arc::new(MockEngine {
            script: Arc::clone(&self.script),
            epoch,
        }))
    }
}

/// A mock engine produced by [`MockLauncher::launch`].
struct MockEngine {
    script: Arc<MockScript>,
    epoch: usize,
}

impl MockEngine {
    fn is_current(&self) -> bool {
        self.script.epoch.load(Ordering::SeqCst) == self.epoch
    }
}

#[async_trait]
impl RenderEngine for MockEngine {
    async fn new_page(&self) -> Result<Arc<dyn RenderPage>> {
        if !self.is_current() || !self.script.connected.load(Ordering::SeqCst) {
            return Err(RenderPoolError::PageCorrupted(
                "engine disconnected".to_string(),
            ));
        }

        let should_fail = self
            .script
            .fail_page_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();

        if should_fail {
            return Err(RenderPoolError::PageCorrupted(
                "scripted page creation failure".to_string(),
            ));
        }

        let delay_ms = self.script.page_creation_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        self.script.pages_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPage {
            script: Arc::clone(&self.script),
            epoch: self.epoch,
            closed: AtomicBool::new(false),
            content: std::sync::Mutex::new(String::new()),
        }))
    }

    fn is_connected(&self) -> bool {
        self.is_current() && self.script.connected.load(Ordering::SeqCst)
    }

    async fn version(&self) -> Result<String> {
        if self.is_connected() {
            Ok("MockChromium/1.0".to_string())
        } else {
            Err(RenderPoolError::BrowserUnavailable)
        }
    }

    fn subscribe_disconnect(&self) -> watch::Receiver<u64> {
        self.script.disconnect_tx.subscribe()
    }

    async fn close(&self) -> Result<()> {
        // A relaunched engine must not be torn down by its predecessor.
        if self.is_current() {
            self.script.connected.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// A mock page produced by [`MockEngine::new_page`].
struct MockPage {
    script: Arc<MockScript>,
    epoch: usize,
    closed: AtomicBool,
    content: std::sync::Mutex<String>,
}

impl MockPage {
    fn check_usable(&self) -> Result<()> {
        if self.script.epoch.load(Ordering::SeqCst) != self.epoch
            || !self.script.connected.load(Ordering::SeqCst)
        {
            return Err(RenderPoolError::PageCorrupted(
                "engine disconnected".to_string(),
            ));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(RenderPoolError::PageCorrupted("page closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RenderPage for MockPage {
    async fn set_content(&self, html: &str) -> Result<()> {
        self.check_usable()?;
        *self.content.lock().unwrap() = html.to_string();
        Ok(())
    }

    async fn export_pdf(&self, _settings: &ExportSettings) -> Result<Vec<u8>> {
        self.check_usable()?;

        struct InFlight<'a>(&'a MockScript);
        impl Drop for InFlight<'_> {
            fn drop(&mut self) {
                self.0.renders_in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }

        // Guard keeps the gauge honest when the export future is
        // cancelled by a timeout.
        let now = self.script.renders_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script
            .peak_concurrent_renders
            .fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.script);

        let delay_ms = self.script.render_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        // The engine may have crashed while we were rendering.
        self.check_usable()?;

        let content_len = self.content.lock().unwrap().len();
        self.script.renders_completed.fetch_add(1, Ordering::SeqCst);

        let mut bytes = format!("%PDF-1.7\n% mock render of {content_len} bytes\n").into_bytes();
        bytes.extend_from_slice(b"%%EOF\n");
        Ok(bytes)
    }

    async fn evaluate(&self, expression: &str) -> Result<String> {
        self.check_usable()?;

        if expression.contains("readyState") {
            let unready = self
                .script
                .bad_readiness_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok();

            return Ok(if unready { "loading" } else { "complete" }.to_string());
        }

        Ok("ok".to_string())
    }

    async fn is_alive(&self) -> bool {
        self.check_usable().is_ok()
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.script.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
