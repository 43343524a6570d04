//! Configuration for pool behavior and rendering limits.
//!
//! This module provides [`PoolConfig`] and [`PoolConfigBuilder`] for
//! configuring the concurrency ceiling, per-operation timeouts, retry
//! policy, and the fixed PDF export settings.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pagepress::PoolConfigBuilder;
//!
//! let config = PoolConfigBuilder::new()
//!     .max_concurrent_pages(4)
//!     .checkout_timeout(Duration::from_secs(10))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.max_concurrent_pages, 4);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use pagepress::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See the [`mod@env`] module for available environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Hard lower bound on the concurrency ceiling.
pub const MIN_CONCURRENT_PAGES: usize = 1;

/// Hard upper bound on the concurrency ceiling.
///
/// Each page is a Chromium renderer context; beyond this the memory cost
/// of a single browser process stops being predictable.
pub const MAX_CONCURRENT_PAGES: usize = 64;

/// Paper format for PDF export.
///
/// The export configuration is fixed per manager instance: every document
/// rendered through the pool uses the same paper geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    /// 8.27 x 11.69 inches (210 x 297 mm). The default.
    A4,
    /// 8.5 x 11 inches.
    Letter,
    /// 8.5 x 14 inches.
    Legal,
}

impl PageFormat {
    /// Paper dimensions in inches as `(width, height)`.
    pub fn dimensions_in(&self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (8.27, 11.69),
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
        }
    }

    /// Parse from a case-insensitive name (`"a4"`, `"letter"`, `"legal"`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "a4" => Some(PageFormat::A4),
            "letter" => Some(PageFormat::Letter),
            "legal" => Some(PageFormat::Legal),
            _ => None,
        }
    }
}

/// Configuration for pool behavior and rendering limits.
///
/// Controls the concurrency ceiling, all blocking-operation timeouts, the
/// bounded retry policy, and the fixed export settings. Use
/// [`PoolConfigBuilder`] for validation and convenience.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_concurrent_pages` | 8 | Concurrency ceiling (1-64) |
/// | `checkout_timeout` | 5s | Default wait for an admission permit |
/// | `navigation_timeout` | 120s | Bound on loading a document into a page |
/// | `export_timeout` | 30s | Bound on PDF export |
/// | `launch_timeout` | 10s | Bound on engine process launch |
/// | `health_timeout` | 3s | Default bound on the health round trip |
/// | `render_attempts` | 3 | Attempts per render for transient page faults |
/// | `retry_backoff` | 100ms | Incremental backoff base between attempts |
/// | `seed_attempts` | 3 | Attempts per page during pool seeding |
/// | `seed_backoff` | 200ms | Exponential backoff base during seeding |
/// | `export_format` | A4 | Paper format |
/// | `export_margin_in` | 0.39 | Page margins in inches (~10mm) |
/// | `print_background` | true | Include background graphics |
/// | `executable_path` | auto | Chromium executable override |
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pages allocated at once (idle + checked out).
    ///
    /// This is the hard concurrency ceiling: exactly this many renders may
    /// execute concurrently, and the (n+1)-th caller queues on checkout.
    /// Validated to the range 1-64 at build time.
    pub max_concurrent_pages: usize,

    /// Default time a caller waits for an admission permit before the
    /// checkout fails with `PoolExhausted`.
    pub checkout_timeout: Duration,

    /// Bound on loading the supplied markup into a page.
    ///
    /// Deliberately large to tolerate heavy documents, but never
    /// unbounded.
    pub navigation_timeout: Duration,

    /// Bound on exporting the loaded document to PDF bytes.
    pub export_timeout: Duration,

    /// Bound on the engine process reaching a connected state at launch.
    pub launch_timeout: Duration,

    /// Default bound on the health probe's engine round trip.
    ///
    /// Seconds, not minutes: the probe is polled from external
    /// liveness/readiness checks.
    pub health_timeout: Duration,

    /// Attempts per render for transient page faults (corrupted or
    /// unready pages). Must be at least 1.
    pub render_attempts: u32,

    /// Incremental backoff base between render attempts
    /// (`retry_backoff * attempt_number`).
    pub retry_backoff: Duration,

    /// Attempts per page during pool seeding before `Init` propagates.
    pub seed_attempts: u32,

    /// Exponential backoff base between seeding attempts.
    pub seed_backoff: Duration,

    /// Paper format for PDF export.
    pub export_format: PageFormat,

    /// Page margins in inches, applied to all four sides.
    pub export_margin_in: f64,

    /// Whether to include background graphics in the exported PDF.
    pub print_background: bool,

    /// Optional pre-provisioned Chromium executable path.
    ///
    /// When `None`, the engine resolves an executable from well-known
    /// installation paths and falls back to downloading a managed build.
    pub executable_path: Option<PathBuf>,
}

impl Default for PoolConfig {
    /// Production-ready default configuration.
    fn default() -> Self {
        Self {
            max_concurrent_pages: 8,
            checkout_timeout: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(120),
            export_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(3),
            render_attempts: 3,
            retry_backoff: Duration::from_millis(100),
            seed_attempts: 3,
            seed_backoff: Duration::from_millis(200),
            export_format: PageFormat::A4,
            export_margin_in: 0.39,
            print_background: true,
            executable_path: None,
        }
    }
}

/// Builder for [`PoolConfig`] with validation.
///
/// Provides a fluent API for constructing validated configurations.
///
/// # Validation
///
/// The [`build()`](Self::build) method validates:
/// - `max_concurrent_pages` within 1-64
/// - `render_attempts` and `seed_attempts` at least 1
/// - `export_margin_in` non-negative
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use pagepress::PoolConfigBuilder;
///
/// let config = PoolConfigBuilder::new()
///     .max_concurrent_pages(16)
///     .navigation_timeout(Duration::from_secs(300))
///     .build()
///     .expect("Invalid configuration");
/// ```
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Set the concurrency ceiling (validated to 1-64 at build time).
    pub fn max_concurrent_pages(mut self, count: usize) -> Self {
        self.config.max_concurrent_pages = count;
        self
    }

    /// Set the default checkout timeout.
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.config.checkout_timeout = timeout;
        self
    }

    /// Set the navigation (document load) timeout.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Set the PDF export timeout.
    pub fn export_timeout(mut self, timeout: Duration) -> Self {
        self.config.export_timeout = timeout;
        self
    }

    /// Set the engine launch timeout.
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.config.launch_timeout = timeout;
        self
    }

    /// Set the default health probe timeout.
    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.config.health_timeout = timeout;
        self
    }

    /// Set the number of attempts per render for transient page faults.
    pub fn render_attempts(mut self, attempts: u32) -> Self {
        self.config.render_attempts = attempts;
        self
    }

    /// Set the incremental backoff base between render attempts.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Set the number of attempts per page during seeding.
    pub fn seed_attempts(mut self, attempts: u32) -> Self {
        self.config.seed_attempts = attempts;
        self
    }

    /// Set the exponential backoff base between seeding attempts.
    pub fn seed_backoff(mut self, backoff: Duration) -> Self {
        self.config.seed_backoff = backoff;
        self
    }

    /// Set the export paper format.
    pub fn export_format(mut self, format: PageFormat) -> Self {
        self.config.export_format = format;
        self
    }

    /// Set the export page margins in inches.
    pub fn export_margin_in(mut self, margin: f64) -> Self {
        self.config.export_margin_in = margin;
        self
    }

    /// Set whether background graphics are included in the export.
    pub fn print_background(mut self, enabled: bool) -> Self {
        self.config.print_background = enabled;
        self
    }

    /// Set a pre-provisioned Chromium executable path.
    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.executable_path = Some(path.into());
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - Returns an error if `max_concurrent_pages` is outside 1-64.
    /// - Returns an error if `render_attempts` or `seed_attempts` is 0.
    /// - Returns an error if `export_margin_in` is negative.
    pub fn build(self) -> std::result::Result<PoolConfig, String> {
        if self.config.max_concurrent_pages < MIN_CONCURRENT_PAGES
            || self.config.max_concurrent_pages > MAX_CONCURRENT_PAGES
        {
            return Err(format!(
                "max_concurrent_pages must be within {}-{}, got {}",
                MIN_CONCURRENT_PAGES, MAX_CONCURRENT_PAGES, self.config.max_concurrent_pages
            ));
        }

        if self.config.render_attempts == 0 {
            return Err("render_attempts must be at least 1".to_string());
        }

        if self.config.seed_attempts == 0 {
            return Err("seed_attempts must be at least 1".to_string());
        }

        if self.config.export_margin_in < 0.0 {
            return Err("export_margin_in must not be negative".to_string());
        }

        Ok(self.config)
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment File
///
/// Uses `dotenvy` to load variables from an `app.env` file in the current
/// directory. The file is optional; if not found, environment variables
/// and defaults are used.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `PAGEPRESS_MAX_PAGES` | usize | 8 | Concurrency ceiling (1-64) |
/// | `PAGEPRESS_CHECKOUT_TIMEOUT_MS` | u64 | 5000 | Checkout timeout |
/// | `PAGEPRESS_NAVIGATION_TIMEOUT_MS` | u64 | 120000 | Document load timeout |
/// | `PAGEPRESS_EXPORT_TIMEOUT_MS` | u64 | 30000 | PDF export timeout |
/// | `PAGEPRESS_EXPORT_FORMAT` | String | a4 | Paper format (a4/letter/legal) |
/// | `PAGEPRESS_PRINT_BACKGROUND` | bool | true | Background graphics flag |
/// | `CHROMIUM_PATH` | String | auto | Chromium executable override |
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::RenderPoolError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from the `app.env` file.
    ///
    /// Automatically called by [`from_env`]; call explicitly if you need
    /// the file loaded earlier or want to check for errors.
    pub fn load_env_file() -> std::result::Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    /// Load configuration from environment variables.
    ///
    /// Reads configuration with sensible defaults; also loads `app.env`
    /// if present.
    ///
    /// # Errors
    ///
    /// Returns [`RenderPoolError::Configuration`] if values fail
    /// validation (for example a pool size outside 1-64).
    pub fn from_env() -> std::result::Result<PoolConfig, RenderPoolError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        let max_pages = std::env::var("PAGEPRESS_MAX_PAGES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8);

        let checkout_ms = std::env::var("PAGEPRESS_CHECKOUT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000u64);

        let navigation_ms = std::env::var("PAGEPRESS_NAVIGATION_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120_000u64);

        let export_ms = std::env::var("PAGEPRESS_EXPORT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30_000u64);

        let format = std::env::var("PAGEPRESS_EXPORT_FORMAT")
            .ok()
            .and_then(|s| PageFormat::parse(&s))
            .unwrap_or(PageFormat::A4);

        let print_background = std::env::var("PAGEPRESS_PRINT_BACKGROUND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        log::info!("Loading pool configuration from environment:");
        log::info!("   - Max concurrent pages: {}", max_pages);
        log::info!("   - Checkout timeout: {}ms", checkout_ms);
        log::info!("   - Navigation timeout: {}ms", navigation_ms);
        log::info!("   - Export timeout: {}ms", export_ms);
        log::info!("   - Export format: {:?}", format);

        let mut builder = PoolConfigBuilder::new()
            .max_concurrent_pages(max_pages)
            .checkout_timeout(Duration::from_millis(checkout_ms))
            .navigation_timeout(Duration::from_millis(navigation_ms))
            .export_timeout(Duration::from_millis(export_ms))
            .export_format(format)
            .print_background(print_background);

        if let Some(path) = executable_path_from_env() {
            log::info!("   - Chromium path: {}", path);
            builder = builder.executable_path(path);
        }

        builder.build().map_err(RenderPoolError::Configuration)
    }

    /// Get the Chromium executable override from the environment.
    ///
    /// Reads the `CHROMIUM_PATH` environment variable. Call [`from_env`]
    /// or [`load_env_file`] first when using an `app.env` file.
    pub fn executable_path_from_env() -> Option<String> {
        std::env::var("CHROMIUM_PATH").ok()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
