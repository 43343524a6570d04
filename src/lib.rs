//! # pagepress
//!
//! Bounded concurrent page pool for high-throughput HTML to PDF rendering
//! over a single headless Chromium process.
//!
//! This crate keeps one long-lived browser process alive and hands a
//! fixed set of reusable pages to concurrent callers, so rendering a
//! document costs a page checkout instead of a process launch.
//!
//! ## Features
//!
//! - **Amortized Startup**: One Chromium process launched once, pages
//!   pre-created and reused across renders
//! - **Admission Control**: A counting semaphore is the only concurrency
//!   gate; the (n+1)-th caller queues, then sheds with `PoolExhausted`
//! - **Crash Recovery**: Disconnects are detected by push notification
//!   and the pool rebuilds itself in the background
//! - **Corruption Containment**: A page that fails validation is
//!   discarded and replaced; it never serves another render
//! - **Bounded Everything**: Launch, checkout, load, export, and health
//!   probes all carry explicit timeouts
//! - **RAII Leases**: Pages return to the pool automatically, even on
//!   error paths
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             Your Application                │
//! └─────────────────┬───────────────────────────┘
//!                   │ render_document(html)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │              RenderManager                  │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │  RenderExecutor (validate, retry,       │ │
//! │ │  bounded load + export)                 │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │  PagePool (semaphore admission,         │ │
//! │ │  idle queue, page lifecycle)            │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │  ProcessSupervisor + Recovery           │ │
//! │ │  (launch, disconnect push, rebuild)     │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   │ CDP
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │        Headless Chromium Process            │
//! │      (managed by chromiumoxide crate)       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagepress::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PoolConfigBuilder::new()
//!         .max_concurrent_pages(8)
//!         .checkout_timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let manager = RenderManager::builder().config(config).build();
//!     manager.initialize().await?;
//!
//!     let pdf = manager
//!         .render_document("<html><body><h1>Invoice</h1></body></html>")
//!         .await?;
//!     assert!(pdf.starts_with(b"%PDF-"));
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! When the `env-config` feature is enabled, you can initialize the
//! manager from environment variables (loaded from an `app.env` file or
//! the system environment):
//!
//! ```rust,no_run
//! use pagepress::init_render_manager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = init_render_manager().await?;
//!     // manager is Arc<RenderManager>, ready for web handlers
//!     Ok(())
//! }
//! ```
//!
//! ### Environment File
//!
//! Create an `app.env` file in your project root (not `.env` for better
//! cross-platform visibility):
//!
//! ```text
//! PAGEPRESS_MAX_PAGES=8
//! PAGEPRESS_CHECKOUT_TIMEOUT_MS=5000
//! PAGEPRESS_EXPORT_FORMAT=a4
//! ```
//!
//! See [`config::env`] for the full variable table.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Enable environment-based configuration |
//! | `test-utils` | Enable the mock engine for testing |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, RenderPoolError>`](Result).
//! Variants map cleanly onto transport responses:
//!
//! ```rust,ignore
//! use pagepress::RenderPoolError;
//!
//! match manager.render_document(html).await {
//!     Ok(pdf) => { /* 200 */ }
//!     Err(RenderPoolError::PoolExhausted) => { /* 429, retry later */ }
//!     Err(RenderPoolError::BrowserUnavailable) => { /* 503, route away */ }
//!     Err(e) => { /* 500 */ eprintln!("Render failed: {}", e); }
//! }
//! ```
//!
//! ## Testing
//!
//! For testing without Chromium, enable the `test-utils` feature and use
//! [`MockLauncher`](engine::mock::MockLauncher):
//!
//! ```rust,ignore
//! use pagepress::engine::mock::MockLauncher;
//!
//! let launcher = MockLauncher::new();
//! let manager = RenderManager::builder()
//!     .launcher(std::sync::Arc::new(launcher.clone()))
//!     .build();
//! ```

#![doc(html_root_url = "https://docs.rs/pagepress/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod lease;
pub mod manager;
pub mod pool;
pub mod prelude;
pub mod recovery;
pub mod stats;
pub mod supervisor;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

// Core types
pub use config::{PageFormat, PoolConfig, PoolConfigBuilder};
pub use engine::{EngineLauncher, ExportSettings, RenderEngine, RenderPage};
pub use error::{RenderPoolError, Result};
pub use executor::RenderExecutor;
pub use lease::PageLease;
pub use manager::{RenderManager, RenderManagerBuilder, SharedRenderManager};
pub use pool::{PagePool, PooledPage};
pub use stats::PoolStats;
pub use supervisor::{ProcessState, ProcessSupervisor};

// Feature-gated re-exports
#[cfg(feature = "env-config")]
pub use config::env::{executable_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use manager::init_render_manager;
