//! Convenient imports for common usage patterns.
//!
//! This module re-exports the most commonly used types from `pagepress`,
//! allowing you to quickly get started with a single import.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pagepress::prelude::*;
//! ```
//!
//! This imports:
//!
//! - [`RenderManager`] - Main facade type
//! - [`RenderManagerBuilder`] - Manager builder
//! - [`PoolConfig`] - Configuration struct
//! - [`PoolConfigBuilder`] - Configuration builder
//! - [`PageFormat`] - Export paper format
//! - [`RenderPoolError`] - Error type
//! - [`Result`] - Result type alias
//! - [`PageLease`] - RAII page lease
//! - [`PoolStats`] - Pool statistics
//! - [`EngineLauncher`] - Launcher trait
//! - [`SharedRenderManager`] - Type alias for a shared manager
//!
//! # Example
//!
//! ```rust,ignore
//! use pagepress::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PoolConfigBuilder::new()
//!         .max_concurrent_pages(4)
//!         .build()?;
//!
//!     let manager = RenderManager::builder().config(config).build();
//!     manager.initialize().await?;
//!
//!     let pdf = manager.render_document("<html></html>").await?;
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types
pub use crate::SharedRenderManager;
pub use crate::config::{PageFormat, PoolConfig, PoolConfigBuilder};
pub use crate::engine::EngineLauncher;
pub use crate::error::{RenderPoolError, Result};
pub use crate::lease::PageLease;
pub use crate::manager::{RenderManager, RenderManagerBuilder};
pub use crate::stats::PoolStats;

// Feature-gated exports
#[cfg(feature = "env-config")]
pub use crate::config::env::{executable_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use crate::manager::init_render_manager;

// Re-export Arc for convenience (commonly needed with SharedRenderManager)
pub use std::sync::Arc;
