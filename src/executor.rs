//! Render execution over leased pages.
//!
//! This module provides [`RenderExecutor`], which owns the actual
//! HTML-to-PDF flow: checkout, readiness validation, bounded load and
//! export, and the release decision. The executor is also where the
//! bounded retry for transient page faults lives, so callers never see a
//! render fail just because one page went bad.
//!
//! # Render Flow
//!
//! ```text
//! connected? -> checkout -> readiness probe -> load html -> export pdf
//!                              |fail              |timeout     |timeout
//!                              v                  v            v
//!                        dispose + retry     dispose +    dispose +
//!                        on a fresh page     RenderTimeout RenderTimeout
//! ```
//!
//! Every blocking step carries its own timeout; nothing a caller submits
//! can wedge a page forever.

use std::sync::Arc;

use crate::config::PoolConfig;
use crate::engine::ExportSettings;
use crate::error::{RenderPoolError, Result};
use crate::lease::PageLease;
use crate::pool::PagePool;
use crate::supervisor::ProcessSupervisor;

/// Document readiness states accepted by the pre-render probe.
const READY_STATES: [&str; 2] = ["complete", "interactive"];

/// Executes renders against pool pages.
pub struct RenderExecutor {
    supervisor: Arc<ProcessSupervisor>,
    pool: Arc<PagePool>,
    config: PoolConfig,
    export_settings: ExportSettings,
}

impl RenderExecutor {
    /// Create an executor over the given pool and supervisor.
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        pool: Arc<PagePool>,
        config: PoolConfig,
    ) -> Self {
        let export_settings = ExportSettings::from_config(&config);
        Self {
            supervisor,
            pool,
            config,
            export_settings,
        }
    }

    /// Render an HTML document to PDF bytes.
    ///
    /// Transient page faults (a corrupted or unready page) are retried on
    /// a fresh page up to [`render_attempts`](PoolConfig::render_attempts)
    /// times with incremental backoff; the caller only sees the failure
    /// once the budget is spent. Admission, outage, and timeout failures
    /// are never retried here.
    ///
    /// # Errors
    ///
    /// - [`RenderPoolError::BrowserUnavailable`] during an engine outage.
    /// - [`RenderPoolError::PoolExhausted`] if no page frees up within
    ///   the checkout timeout.
    /// - [`RenderPoolError::RenderTimeout`] if load or export exceeds its
    ///   bound.
    /// - [`RenderPoolError::PageCorrupted`] / [`RenderPoolError::Validation`]
    ///   if every retry attempt failed.
    pub async fn render(&self, html: &str) -> Result<Vec<u8>> {
        if !self.supervisor.is_connected() {
            return Err(RenderPoolError::BrowserUnavailable);
        }

        let attempts = self.config.render_attempts.max(1);
        let mut last_error = RenderPoolError::PageCorrupted("no attempt made".to_string());

        for attempt in 1..=attempts {
            if attempt > 1 {
                let backoff = self.config.retry_backoff * (attempt - 1);
                log::debug!("Retrying render in {backoff:?} (attempt {attempt}/{attempts})");
                tokio::time::sleep(backoff).await;
            }

            match self.render_once(html).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempt < attempts => {
                    log::warn!("Render attempt {attempt}/{attempts} failed on a bad page: {e}");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    /// One render attempt on one leased page.
    async fn render_once(&self, html: &str) -> Result<Vec<u8>> {
        let lease = self.pool.checkout(self.config.checkout_timeout).await?;
        log::debug!("Rendering on page #{}", lease.id());

        if let Err(e) = self.probe_readiness(&lease).await {
            lease.release(false).await;
            return Err(e);
        }

        if let Err(e) = self.load_document(&lease, html).await {
            lease.release(false).await;
            return Err(e);
        }

        match self.export_document(&lease).await {
            Ok(bytes) => {
                lease.release(true).await;
                Ok(bytes)
            }
            Err(e) => {
                lease.release(false).await;
                Err(e)
            }
        }
    }

    /// Verify the page still hosts a responsive, settled document.
    async fn probe_readiness(&self, lease: &PageLease) -> Result<()> {
        let state = lease.page().evaluate("document.readyState").await?;
        if READY_STATES.contains(&state.as_str()) {
            Ok(())
        } else {
            Err(RenderPoolError::Validation(format!(
                "unexpected document readiness state: {state:?}"
            )))
        }
    }

    /// Load the markup, bounded by the navigation timeout.
    async fn load_document(&self, lease: &PageLease, html: &str) -> Result<()> {
        tokio::time::timeout(self.config.navigation_timeout, lease.page().set_content(html))
            .await
            .map_err(|_| {
                log::warn!(
                    "Document load exceeded {:?} on page #{}",
                    self.config.navigation_timeout,
                    lease.id()
                );
                RenderPoolError::RenderTimeout(format!(
                    "document load exceeded {:?}",
                    self.config.navigation_timeout
                ))
            })?
    }

    /// Export the PDF, bounded by the export timeout, and sanity-check
    /// the result.
    async fn export_document(&self, lease: &PageLease) -> Result<Vec<u8>> {
        let bytes = tokio::time::timeout(
            self.config.export_timeout,
            lease.page().export_pdf(&self.export_settings),
        )
        .await
        .map_err(|_| {
            log::warn!(
                "PDF export exceeded {:?} on page #{}",
                self.config.export_timeout,
                lease.id()
            );
            RenderPoolError::RenderTimeout(format!(
                "PDF export exceeded {:?}",
                self.config.export_timeout
            ))
        })??;

        // A valid PDF starts with the %PDF- magic header.
        if !bytes.starts_with(b"%PDF-") {
            return Err(RenderPoolError::Validation(
                "export did not produce a PDF document".to_string(),
            ));
        }

        log::debug!("Rendered {} bytes of PDF", bytes.len());
        Ok(bytes)
    }
}

impl std::fmt::Debug for RenderExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderExecutor")
            .field("attempts", &self.config.render_attempts)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PoolConfigBuilder;
    use crate::engine::mock::MockLauncher;

    async fn executor_with(launcher: MockLauncher, config: PoolConfig) -> RenderExecutor {
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::new(launcher),
            config.clone(),
        ));
        supervisor.start().await.unwrap();
        let pool = Arc::new(PagePool::new(Arc::clone(&supervisor), config.clone()));
        pool.seed().await.unwrap();
        RenderExecutor::new(supervisor, pool, config)
    }

    fn small_config(capacity: usize) -> PoolConfig {
        PoolConfigBuilder::new()
            .max_concurrent_pages(capacity)
            .checkout_timeout(Duration::from_millis(200))
            .retry_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    /// Verifies a successful render produces PDF magic bytes and reuses
    /// the page.
    #[tokio::test]
    async fn test_render_produces_pdf() {
        let launcher = MockLauncher::new();
        let executor = executor_with(launcher.clone(), small_config(1)).await;

        let bytes = executor.render("<html><body>hello</body></html>").await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let bytes = executor.render("<html><body>again</body></html>").await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        assert_eq!(launcher.pages_created(), 1, "Page should be reused");
        assert_eq!(launcher.renders_completed(), 2);
    }

    /// Verifies that a corrupted page is retried transparently on a
    /// replacement and the caller sees only success.
    #[tokio::test]
    async fn test_corrupted_page_retried_transparently() {
        let launcher = MockLauncher::new();
        let executor = executor_with(launcher.clone(), small_config(1)).await;

        launcher.fail_next_readiness(1);
        let bytes = executor.render("<html><body>retry me</body></html>").await.unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(launcher.pages_closed(), 1, "Corrupted page disposed");
        assert_eq!(launcher.pages_created(), 2, "Replacement created");
    }

    /// Verifies that the retry budget is bounded: persistent corruption
    /// surfaces after the configured attempts.
    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let launcher = MockLauncher::new();
        let executor = executor_with(launcher.clone(), small_config(1)).await;

        launcher.fail_next_readiness(100);
        let result = executor.render("<html></html>").await;

        assert!(matches!(result, Err(RenderPoolError::Validation(_))));
        // Default budget is 3 attempts, one checkout each.
        assert_eq!(launcher.pages_created(), 1 + 3, "One page per attempt");
    }

    /// Verifies that pool exhaustion is not retried by the executor.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_exhaustion_not_retried() {
        let launcher = MockLauncher::new();
        let executor = Arc::new(executor_with(launcher.clone(), small_config(1)).await);

        launcher.set_render_delay(Duration::from_millis(500));
        let busy = Arc::clone(&executor);
        let background =
            tokio::spawn(async move { busy.render("<html><body>slow</body></html>").await });

        // Give the background render time to take the only page.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let pages_before = launcher.pages_created();
        let result = executor.render("<html></html>").await;
        assert!(matches!(result, Err(RenderPoolError::PoolExhausted)));
        assert_eq!(
            launcher.pages_created(),
            pages_before,
            "Exhaustion must not burn pages or retries"
        );

        background.await.unwrap().unwrap();
    }

    /// Verifies that renders during an outage fail BrowserUnavailable
    /// without queuing.
    #[tokio::test]
    async fn test_render_during_outage() {
        let launcher = MockLauncher::new();
        let executor = executor_with(launcher.clone(), small_config(2)).await;

        launcher.trigger_disconnect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = executor.render("<html></html>").await;
        assert!(matches!(result, Err(RenderPoolError::BrowserUnavailable)));
    }

    /// Verifies that a render exceeding the export bound fails
    /// RenderTimeout and the page is disposed, not reused.
    #[tokio::test]
    async fn test_export_timeout_disposes_page() {
        let launcher = MockLauncher::new();
        let config = PoolConfigBuilder::new()
            .max_concurrent_pages(1)
            .export_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let executor = executor_with(launcher.clone(), config).await;

        launcher.set_render_delay(Duration::from_millis(500));
        let result = executor.render("<html><body>slow</body></html>").await;

        assert!(matches!(result, Err(RenderPoolError::RenderTimeout(_))));
        assert_eq!(launcher.pages_closed(), 1, "Timed-out page disposed");

        // The pool healed with a replacement; fast renders work again.
        launcher.set_render_delay(Duration::ZERO);
        let bytes = executor.render("<html></html>").await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
