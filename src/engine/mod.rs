//! Rendering engine abstraction.
//!
//! This module provides the capability traits behind which the concrete
//! browser binding lives:
//!
//! - [`RenderEngine`] — a connected browser process: page creation,
//!   connectivity probes, disconnect notification.
//! - [`RenderPage`] — a single page (tab): content loading, PDF export,
//!   script evaluation.
//! - [`EngineLauncher`] — launches an engine process from a [`PoolConfig`].
//!
//! # Overview
//!
//! The launcher pattern abstracts process startup, allowing:
//! - The production Chromium binding ([`chromium::ChromiumLauncher`])
//! - Scriptable fakes for testing ([`mock::MockLauncher`], feature-gated)
//!
//! # Available Engines
//!
//! | Launcher | Description |
//! |----------|-------------|
//! | [`chromium::ChromiumLauncher`] | Launches headless Chromium over CDP |
//! | [`mock::MockLauncher`] | For testing (feature-gated) |
//!
//! # Disconnect Notification
//!
//! Engines expose disconnects as a push signal, never a polled flag: the
//! [`watch`](tokio::sync::watch) receiver returned by
//! [`RenderEngine::subscribe_disconnect`] carries a generation counter
//! that is bumped exactly once when the process connection is lost.
//! Subscribers await `changed()` and react immediately.

pub mod chromium;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::PoolConfig;
use crate::error::Result;

/// PDF export settings derived from the pool configuration.
///
/// Fixed per manager instance; every render uses the same geometry.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Paper width in inches.
    pub paper_width_in: f64,
    /// Paper height in inches.
    pub paper_height_in: f64,
    /// Margin applied to all four sides, in inches.
    pub margin_in: f64,
    /// Whether background graphics are included.
    pub print_background: bool,
}

impl ExportSettings {
    /// Derive export settings from a [`PoolConfig`].
    pub fn from_config(config: &PoolConfig) -> Self {
        let (paper_width_in, paper_height_in) = config.export_format.dimensions_in();
        Self {
            paper_width_in,
            paper_height_in,
            margin_in: config.export_margin_in,
            print_background: config.print_background,
        }
    }
}

/// A single rendering page (browser tab).
///
/// Pages are owned by the pool and handed to one render at a time. All
/// operations are async round trips to the engine process; callers wrap
/// them in their own timeouts.
///
/// # Thread Safety
///
/// Requires `Send + Sync` because pages are shared across tasks via
/// `Arc<dyn RenderPage>`.
#[async_trait]
pub trait RenderPage: Send + Sync {
    /// Load the given markup into the page and wait for the load to settle.
    async fn set_content(&self, html: &str) -> Result<()>;

    /// Export the currently loaded document as PDF bytes.
    async fn export_pdf(&self, settings: &ExportSettings) -> Result<Vec<u8>>;

    /// Evaluate a script expression and return its string result.
    ///
    /// Used by the executor's readiness probe
    /// (`document.readyState`) and by the pool's liveness check.
    async fn evaluate(&self, expression: &str) -> Result<String>;

    /// Whether the page still responds to a trivial round trip.
    ///
    /// Never errors; a failed round trip reports `false`.
    async fn is_alive(&self) -> bool;

    /// Close the page, releasing its renderer resources.
    ///
    /// Closing an already-dead page is not an error.
    async fn close(&self) -> Result<()>;
}

/// A connected rendering engine process.
///
/// One engine instance corresponds to one browser process. The pool
/// creates pages through it; the supervisor owns its lifecycle.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Create a new blank page in this process.
    ///
    /// # Errors
    ///
    /// Returns [`PageCorrupted`](crate::RenderPoolError::PageCorrupted)
    /// if the engine refuses or the round trip fails.
    async fn new_page(&self) -> Result<Arc<dyn RenderPage>>;

    /// Whether the process connection is currently believed live.
    ///
    /// Cheap, no round trip. Use [`version`](Self::version) for a real
    /// health round trip.
    fn is_connected(&self) -> bool;

    /// Round-trip probe: ask the process for its version string.
    async fn version(&self) -> Result<String>;

    /// Subscribe to disconnect notifications.
    ///
    /// The returned receiver observes a generation counter bumped when
    /// the process connection is lost. Await
    /// [`changed()`](watch::Receiver::changed) to be woken on disconnect.
    fn subscribe_disconnect(&self) -> watch::Receiver<u64>;

    /// Shut the process down and release its resources.
    async fn close(&self) -> Result<()>;
}

/// Launches rendering engine processes.
///
/// # Implementors
///
/// - [`chromium::ChromiumLauncher`] — headless Chromium over CDP
/// - [`mock::MockLauncher`] — scriptable fake (when `test-utils` enabled)
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Launch a new engine process.
    ///
    /// Implementations perform executable resolution and process spawn
    /// but leave the launch timeout to the caller (the supervisor wraps
    /// this call in [`PoolConfig::launch_timeout`]).
    ///
    /// # Errors
    ///
    /// Returns [`Init`](crate::RenderPoolError::Init) if the process
    /// cannot be provisioned or launched.
    async fn launch(&self, config: &PoolConfig) -> Result<Arc<dyn RenderEngine>>;
}

// ============================================================================
// Unit Tests
// ============================================================================
