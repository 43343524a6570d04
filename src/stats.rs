//! Pool statistics for monitoring and health checks.
//!
//! This module provides [`PoolStats`], a snapshot of the page pool's
//! current state. Use it for monitoring, logging, and health checks.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = /* initialized RenderManager */;
//!
//! let stats = manager.stats();
//! println!("Idle: {}/{}", stats.idle, stats.capacity);
//! ```

/// Snapshot of pool statistics at a point in time.
///
/// Useful for monitoring, logging, and health checks.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `idle` | Pages parked in the pool, ready for checkout |
/// | `active` | All pages in existence (idle + checked out) |
/// | `capacity` | Configured concurrency ceiling |
///
/// # Example
///
/// ```rust
/// use pagepress::PoolStats;
///
/// let stats = PoolStats {
///     idle: 3,
///     active: 5,
///     capacity: 8,
/// };
///
/// println!("Pool status: {}/{} idle", stats.idle, stats.active);
/// ```
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Number of pages parked in the pool (ready for checkout).
    ///
    /// # Note
    ///
    /// This value can change immediately after reading if another task
    /// checks out or returns a page.
    pub idle: usize,

    /// Number of pages in existence (idle + checked out).
    ///
    /// # Relationship to `idle`
    ///
    /// - `active` >= `idle` (always)
    /// - `active` - `idle` = pages currently checked out
    /// - `active` < `capacity` only while replacement creation has been
    ///   failing; recovery restores it to `capacity`
    pub active: usize,

    /// Configured concurrency ceiling (`max_concurrent_pages`).
    pub capacity: usize,
}

impl PoolStats {
    /// Get the number of pages currently checked out.
    ///
    /// This is a convenience method that calculates `active - idle`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pagepress::PoolStats;
    ///
    /// let stats = PoolStats {
    ///     idle: 3,
    ///     active: 5,
    ///     capacity: 8,
    /// };
    ///
    /// assert_eq!(stats.checked_out(), 2);
    /// ```
    #[inline]
    pub fn checked_out(&self) -> usize {
        self.active.saturating_sub(self.idle)
    }

    /// Check if the pool has idle pages.
    #[inline]
    pub fn has_idle(&self) -> bool {
        self.idle > 0
    }

    /// Check if the pool is empty (no pages at all).
    ///
    /// The pool is empty before seeding and during a recovery drain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }
}

impl std::fmt::Display for PoolStats {
    /// Format stats for logging.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pagepress::PoolStats;
    ///
    /// let stats = PoolStats {
    ///     idle: 3,
    ///     active: 5,
    ///     capacity: 8,
    /// };
    ///
    /// assert_eq!(
    ///     stats.to_string(),
    ///     "PoolStats { idle: 3, active: 5, capacity: 8 }"
    /// );
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PoolStats {{ idle: {}, active: {}, capacity: {} }}",
            self.idle, self.active, self.capacity
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies PoolStats structure and field access.
    #[test]
    fn test_pool_stats_structure() {
        let stats = PoolStats {
            idle: 5,
            active: 6,
            capacity: 8,
        };

        assert_eq!(stats.idle, 5, "Idle pages should be accessible");
        assert_eq!(stats.active, 6, "Active pages should be accessible");
        assert_eq!(stats.capacity, 8, "Capacity should be accessible");
    }

    /// Verifies the checked_out() convenience method.
    #[test]
    fn test_checked_out() {
        let stats = PoolStats {
            idle: 2,
            active: 5,
            capacity: 8,
        };

        assert_eq!(stats.checked_out(), 3);
    }

    /// Verifies checked_out() handles edge case where idle > active.
    #[test]
    fn test_checked_out_saturating() {
        // Edge case: shouldn't happen in practice, but handle gracefully
        let stats = PoolStats {
            idle: 10,
            active: 5,
            capacity: 8,
        };

        assert_eq!(stats.checked_out(), 0); // saturating_sub prevents underflow
    }

    /// Verifies has_idle() method.
    #[test]
    fn test_has_idle() {
        let stats_with = PoolStats {
            idle: 1,
            active: 1,
            capacity: 2,
        };
        assert!(stats_with.has_idle());

        let stats_without = PoolStats {
            idle: 0,
            active: 1,
            capacity: 2,
        };
        assert!(!stats_without.has_idle());
    }

    /// Verifies is_empty() method.
    #[test]
    fn test_is_empty() {
        let empty = PoolStats {
            idle: 0,
            active: 0,
            capacity: 2,
        };
        assert!(empty.is_empty());

        let not_empty = PoolStats {
            idle: 0,
            active: 1,
            capacity: 2,
        };
        assert!(!not_empty.is_empty());
    }

    /// Verifies Display implementation.
    #[test]
    fn test_display() {
        let stats = PoolStats {
            idle: 3,
            active: 5,
            capacity: 8,
        };

        assert_eq!(
            stats.to_string(),
            "PoolStats { idle: 3, active: 5, capacity: 8 }"
        );
    }

    /// Verifies that PoolStats implements Clone and Debug.
    #[test]
    fn test_clone_and_debug() {
        let stats = PoolStats {
            idle: 3,
            active: 5,
            capacity: 8,
        };

        let cloned = stats.clone();
        assert_eq!(cloned.idle, stats.idle);
        assert_eq!(cloned.active, stats.active);

        let debug_str = format!("{:?}", stats);
        assert!(debug_str.contains("PoolStats"));
        assert!(debug_str.contains("idle"));
    }
}
