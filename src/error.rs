//! Error types for the page pool.
//!
//! This module provides [`RenderPoolError`], a unified error type for all
//! pool and rendering operations, and a convenient [`Result`] type alias.
//!
//! # Error Classification
//!
//! Callers can make retry decisions purely from the error variant:
//!
//! | Variant | Class | Caller action |
//! |---------|-------|---------------|
//! | [`Init`](RenderPoolError::Init) | Fatal to startup | Fix environment, restart |
//! | [`PoolExhausted`](RenderPoolError::PoolExhausted) | Load shedding | Back off and retry |
//! | [`BrowserUnavailable`](RenderPoolError::BrowserUnavailable) | Outage | Route elsewhere, retry after recovery |
//! | [`PageCorrupted`](RenderPoolError::PageCorrupted) | Transient | Retried internally |
//! | [`RenderTimeout`](RenderPoolError::RenderTimeout) | Per-request | Simplify document or raise timeout |
//! | [`Validation`](RenderPoolError::Validation) | Transient | Retried internally |
//! | [`ShuttingDown`](RenderPoolError::ShuttingDown) | Terminal | Stop sending work |
//! | [`Configuration`](RenderPoolError::Configuration) | Programming error | Fix configuration |
//!
//! # Example
//!
//! ```rust
//! use pagepress::RenderPoolError;
//!
//! fn classify(error: &RenderPoolError) -> &'static str {
//!     match error {
//!         RenderPoolError::PoolExhausted => "retry-later",
//!         RenderPoolError::BrowserUnavailable => "route-elsewhere",
//!         _ => "fail",
//!     }
//! }
//! ```

/// Errors that can occur during pool and rendering operations.
///
/// Each variant corresponds to a distinct failure class so that the
/// transport layer can translate it into a meaningful response (429 vs.
/// 503 vs. 500) and clients can make correct retry decisions.
#[derive(Debug, thiserror::Error)]
pub enum RenderPoolError {
    /// The rendering engine process could not be launched or provisioned.
    ///
    /// Fatal to startup; the pool never retries this itself. Common causes
    /// are a missing Chromium executable, a bad executable-path override,
    /// or the process failing to reach a connected state within the launch
    /// timeout.
    #[error("Failed to initialize rendering engine: {0}")]
    Init(String),

    /// No admission permit became available within the caller's timeout.
    ///
    /// All pages are checked out and the caller's patience ran out while
    /// queued. This is deliberate backpressure, not a fault: the caller
    /// may retry with its own backoff, or shed the request upstream.
    #[error("Pool exhausted: no page became available within the checkout timeout")]
    PoolExhausted,

    /// The rendering engine process is currently disconnected.
    ///
    /// Surfaced immediately without consuming an admission permit so a
    /// load balancer can route around this instance. The recovery
    /// coordinator restores the process in the background; once
    /// [`is_healthy`](crate::RenderManager::is_healthy) reports true
    /// again, renders succeed.
    #[error("Rendering engine is unavailable (process disconnected)")]
    BrowserUnavailable,

    /// A page failed its liveness or readiness validation.
    ///
    /// The page is always discarded and replaced; the render is retried a
    /// bounded number of times on a fresh page before this surfaces to
    /// the caller.
    #[error("Page corrupted: {0}")]
    PageCorrupted(String),

    /// Navigation or export exceeded its configured bound.
    ///
    /// The page is discarded (its state after an interrupted load is
    /// unknown) and the error surfaces to the caller without retry.
    #[error("Render timed out: {0}")]
    RenderTimeout(String),

    /// The page reported an unexpected document-readiness state.
    ///
    /// Treated exactly like [`PageCorrupted`](Self::PageCorrupted): page
    /// discarded, render retried on a replacement.
    #[error("Page readiness validation failed: {0}")]
    Validation(String),

    /// Operation attempted during manager shutdown.
    ///
    /// All operations are rejected once shutdown begins. Handle it by
    /// stopping pending work rather than retrying.
    #[error("Manager is shutting down")]
    ShuttingDown,

    /// Invalid configuration provided.
    ///
    /// Use [`PoolConfigBuilder`](crate::PoolConfigBuilder), which
    /// validates configuration at build time.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RenderPoolError {
    /// Whether the render executor may retry this failure on a fresh page.
    ///
    /// Only per-page faults are retryable; process-level and
    /// admission-level failures surface immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RenderPoolError::PageCorrupted(_) | RenderPoolError::Validation(_)
        )
    }
}

/// Convenience conversion from [`String`] to [`RenderPoolError::Configuration`].
impl From<String> for RenderPoolError {
    fn from(msg: String) -> Self {
        RenderPoolError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`RenderPoolError::Configuration`].
impl From<&str> for RenderPoolError {
    fn from(msg: &str) -> Self {
        RenderPoolError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`RenderPoolError`].
pub type Result<T> = std::result::Result<T, RenderPoolError>;

// ============================================================================
// Unit Tests
// ============================================================================
