//! Public facade over the pool, supervisor, executor, and recovery.
//!
//! This module provides [`RenderManager`], the single entry point for
//! applications: initialize once, call
//! [`render_document`](RenderManager::render_document) from as many tasks
//! as you like, poll [`is_healthy`](RenderManager::is_healthy) from your
//! liveness endpoint, and [`shutdown`](RenderManager::shutdown) on the
//! way out.
//!
//! # Example
//!
//! ```rust,ignore
//! use pagepress::{RenderManager, PoolConfigBuilder};
//!
//! let config = PoolConfigBuilder::new().max_concurrent_pages(4).build()?;
//! let manager = RenderManager::builder().config(config).build();
//! manager.initialize().await?;
//!
//! let pdf = manager.render_document("<html><body>Invoice</body></html>").await?;
//! assert!(pdf.starts_with(b"%PDF-"));
//!
//! manager.shutdown().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::engine::EngineLauncher;
use crate::engine::chromium::ChromiumLauncher;
use crate::error::{RenderPoolError, Result};
use crate::executor::RenderExecutor;
use crate::pool::PagePool;
use crate::recovery::RecoveryCoordinator;
use crate::stats::PoolStats;
use crate::supervisor::ProcessSupervisor;

/// Shared manager handle for passing across tasks and handlers.
pub type SharedRenderManager = Arc<RenderManager>;

/// Facade over the rendering pool.
///
/// Construction via [`builder()`](Self::builder) is cheap and performs no
/// I/O; the engine launches and the pool seeds on
/// [`initialize()`](Self::initialize).
pub struct RenderManager {
    config: PoolConfig,
    supervisor: Arc<ProcessSupervisor>,
    pool: Arc<PagePool>,
    executor: RenderExecutor,
    recovery_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    init_lock: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    shutting_down: AtomicBool,
}

impl RenderManager {
    /// Start building a manager.
    pub fn builder() -> RenderManagerBuilder {
        RenderManagerBuilder::new()
    }

    /// Launch the engine and seed the pool.
    ///
    /// Idempotent: concurrent and repeated calls perform the work once.
    ///
    /// # Errors
    ///
    /// - [`RenderPoolError::Init`] if the engine cannot launch or the
    ///   pool cannot seed. The manager stays initializable afterwards.
    /// - [`RenderPoolError::ShuttingDown`] after shutdown has begun.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;

        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RenderPoolError::ShuttingDown);
        }
        if self.initialized.load(Ordering::SeqCst) {
            log::debug!("Manager already initialized");
            return Ok(());
        }

        self.supervisor.start().await?;
        self.pool.seed().await?;

        let task = RecoveryCoordinator::spawn(
            Arc::clone(&self.supervisor),
            Arc::clone(&self.pool),
            self.config.clone(),
        );
        *self.recovery_task.lock().unwrap() = Some(task);

        self.initialized.store(true, Ordering::SeqCst);
        log::info!(
            "Render manager initialized ({} pages)",
            self.config.max_concurrent_pages
        );
        Ok(())
    }

    /// Render an HTML document to PDF bytes.
    ///
    /// Safe to call from any number of tasks concurrently; admission
    /// control queues the surplus and sheds it after the checkout
    /// timeout.
    ///
    /// # Errors
    ///
    /// See [`RenderExecutor::render`] for the failure taxonomy.
    pub async fn render_document(&self, html: &str) -> Result<Vec<u8>> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RenderPoolError::ShuttingDown);
        }
        self.executor.render(html).await
    }

    /// Whether the manager can currently serve renders.
    ///
    /// Performs a real engine round trip bounded by `timeout` (default
    /// [`health_timeout`](PoolConfig::health_timeout)). Side-effect free:
    /// no page is consumed, no permit is taken. Reports `false` from the
    /// instant a crash is detected until recovery completes.
    pub async fn is_healthy(&self, timeout: Option<Duration>) -> bool {
        if self.shutting_down.load(Ordering::SeqCst) {
            return false;
        }
        if !self.supervisor.is_connected() {
            return false;
        }

        let engine = match self.supervisor.engine() {
            Ok(engine) => engine,
            Err(_) => return false,
        };

        let bound = timeout.unwrap_or(self.config.health_timeout);
        match tokio::time::timeout(bound, engine.version()).await {
            Ok(Ok(version)) => {
                log::debug!("Health probe ok: {version}");
                true
            }
            Ok(Err(e)) => {
                log::warn!("Health probe failed: {e}");
                false
            }
            Err(_) => {
                log::warn!("Health probe timed out after {bound:?}");
                false
            }
        }
    }

    /// Snapshot of the pool state.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Stop accepting work and tear everything down.
    ///
    /// New and queued renders fail [`RenderPoolError::ShuttingDown`], the
    /// recovery task stops, idle pages close, and the engine process
    /// exits. Repeated calls are no-ops.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Render manager shutting down...");

        self.pool.close();

        let task = self.recovery_task.lock().unwrap().take();
        if let Some(task) = task {
            task.abort();
        }

        self.pool.drain_all().await;
        self.supervisor.stop().await;
        log::info!("Render manager shut down");
    }
}

impl std::fmt::Debug for RenderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderManager")
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`RenderManager`].
///
/// # Example
///
/// ```rust,ignore
/// let manager = RenderManager::builder()
///     .config(config)
///     .build();
/// ```
pub struct RenderManagerBuilder {
    config: PoolConfig,
    launcher: Option<Arc<dyn EngineLauncher>>,
}

impl RenderManagerBuilder {
    /// Create a builder with default configuration and launcher.
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            launcher: None,
        }
    }

    /// Use the given configuration (default: [`PoolConfig::default`]).
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom engine launcher (default: [`ChromiumLauncher`]).
    ///
    /// Mainly for tests, which plug in the mock engine here.
    pub fn launcher(mut self, launcher: Arc<dyn EngineLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Build the manager. Performs no I/O.
    pub fn build(self) -> RenderManager {
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(ChromiumLauncher::new()));
        let supervisor = Arc::new(ProcessSupervisor::new(launcher, self.config.clone()));
        let pool = Arc::new(PagePool::new(Arc::clone(&supervisor), self.config.clone()));
        let executor = RenderExecutor::new(
            Arc::clone(&supervisor),
            Arc::clone(&pool),
            self.config.clone(),
        );

        RenderManager {
            config: self.config,
            supervisor,
            pool,
            executor,
            recovery_task: std::sync::Mutex::new(None),
            init_lock: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }
}

impl Default for RenderManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Bootstrap (feature-gated)
// ============================================================================

/// Build and initialize a manager from environment configuration.
///
/// Loads [`config::env::from_env`](crate::config::env::from_env)
/// (including an optional `app.env` file), builds the manager with the
/// Chromium launcher, and initializes it.
///
/// # Errors
///
/// Returns [`RenderPoolError::Configuration`] for invalid environment
/// values and [`RenderPoolError::Init`] if the engine cannot start.
#[cfg(feature = "env-config")]
pub async fn init_render_manager() -> Result<SharedRenderManager> {
    let config = crate::config::env::from_env()?;
    let manager = RenderManager::builder().config(config).build();
    manager.initialize().await?;
    Ok(Arc::new(manager))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfigBuilder;
    use crate::engine::mock::MockLauncher;

    fn mock_manager(launcher: MockLauncher, capacity: usize) -> RenderManager {
        let config = PoolConfigBuilder::new()
            .max_concurrent_pages(capacity)
            .build()
            .unwrap();
        RenderManager::builder()
            .config(config)
            .launcher(Arc::new(launcher))
            .build()
    }

    /// Verifies that initialize() is idempotent.
    #[tokio::test]
    async fn test_initialize_idempotent() {
        let launcher = MockLauncher::new();
        let manager = mock_manager(launcher.clone(), 2);

        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();

        assert_eq!(launcher.launch_attempts(), 1, "One launch expected");
        assert_eq!(launcher.pages_created(), 2, "One seeding expected");
        manager.shutdown().await;
    }

    /// Verifies a render through the full facade.
    #[tokio::test]
    async fn test_render_document() {
        let launcher = MockLauncher::new();
        let manager = mock_manager(launcher, 1);
        manager.initialize().await.unwrap();

        let pdf = manager
            .render_document("<html><body>Invoice</body></html>")
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-"));

        manager.shutdown().await;
    }

    /// Verifies health reporting across the lifecycle.
    #[tokio::test]
    async fn test_health_lifecycle() {
        let launcher = MockLauncher::new();
        let manager = mock_manager(launcher.clone(), 1);

        assert!(!manager.is_healthy(None).await, "Unhealthy before init");

        manager.initialize().await.unwrap();
        assert!(manager.is_healthy(None).await, "Healthy after init");

        manager.shutdown().await;
        assert!(!manager.is_healthy(None).await, "Unhealthy after shutdown");
    }

    /// Verifies that shutdown rejects further work.
    #[tokio::test]
    async fn test_shutdown_rejects_work() {
        let launcher = MockLauncher::new();
        let manager = mock_manager(launcher.clone(), 1);
        manager.initialize().await.unwrap();

        manager.shutdown().await;
        // Repeated shutdown is a no-op.
        manager.shutdown().await;

        let result = manager.render_document("<html></html>").await;
        assert!(matches!(result, Err(RenderPoolError::ShuttingDown)));

        let result = manager.initialize().await;
        assert!(matches!(result, Err(RenderPoolError::ShuttingDown)));

        assert_eq!(launcher.pages_closed(), 1, "Idle pages closed on shutdown");
    }

    /// Verifies that a failed initialization leaves the manager
    /// initializable.
    #[tokio::test]
    async fn test_failed_initialize_can_retry() {
        let launcher = MockLauncher::fail_launches(1);
        let manager = mock_manager(launcher.clone(), 1);

        let result = manager.initialize().await;
        assert!(matches!(result, Err(RenderPoolError::Init(_))));
        assert!(!manager.is_healthy(None).await);

        manager.initialize().await.unwrap();
        assert!(manager.is_healthy(None).await);
        manager.shutdown().await;
    }

    /// Verifies the stats surface.
    #[tokio::test]
    async fn test_stats() {
        let launcher = MockLauncher::new();
        let manager = mock_manager(launcher, 3);
        manager.initialize().await.unwrap();

        let stats = manager.stats();
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.checked_out(), 0);

        manager.shutdown().await;
    }
}
