//! RAII lease over a checked-out page.
//!
//! This module provides [`PageLease`], the guard returned by
//! [`PagePool::checkout`](crate::pool::PagePool::checkout). A lease holds
//! the page and its admission permit; returning both is automatic.
//!
//! # Release Paths
//!
//! The executor releases leases explicitly with
//! [`release`](PageLease::release), stating whether the page is safe to
//! reuse. Dropping a lease without an explicit release is the panic/error
//! escape hatch: the page's state is unknown, so the drop path treats it
//! as corrupted and disposes it on a background task. Either way the
//! permit frees only after the pool has finished its bookkeeping.

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use crate::engine::RenderPage;
use crate::pool::{PagePool, PooledPage};

/// RAII guard over a checked-out page and its admission permit.
///
/// Obtained from [`PagePool::checkout`]. Prefer the explicit
/// [`release`](Self::release) over dropping: the drop path has to assume
/// the page is corrupted.
pub struct PageLease {
    pool: Arc<PagePool>,
    pooled: Option<PooledPage>,
    permit: Option<OwnedSemaphorePermit>,
    // Captured at checkout so the drop path can spawn cleanup even when
    // dropped outside an async context.
    runtime: tokio::runtime::Handle,
}

impl PageLease {
    pub(crate) fn new(
        pool: Arc<PagePool>,
        pooled: PooledPage,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            pool,
            pooled: Some(pooled),
            permit: Some(permit),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// The leased page.
    pub fn page(&self) -> &Arc<dyn RenderPage> {
        // Both fields stay populated until release() consumes self.
        self.pooled
            .as_ref()
            .expect("lease accessed after release")
            .page()
    }

    /// Pool id of the leased page, for log correlation.
    pub fn id(&self) -> u64 {
        self.pooled
            .as_ref()
            .expect("lease accessed after release")
            .id()
    }

    /// Return the page to the pool.
    ///
    /// `reusable: true` resets the page and parks it for the next caller;
    /// `reusable: false` disposes it and attempts a replacement. The
    /// admission permit frees after either path completes.
    pub async fn release(mut self, reusable: bool) {
        if let (Some(pooled), Some(permit)) = (self.pooled.take(), self.permit.take()) {
            self.pool.release(pooled, reusable, permit).await;
        }
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if let (Some(pooled), Some(permit)) = (self.pooled.take(), self.permit.take()) {
            log::warn!(
                "Page lease #{} dropped without explicit release, disposing page",
                pooled.id()
            );
            let pool = Arc::clone(&self.pool);
            self.runtime.spawn(async move {
                pool.release(pooled, false, permit).await;
            });
        }
    }
}

impl std::fmt::Debug for PageLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageLease")
            .field("page_id", &self.pooled.as_ref().map(PooledPage::id))
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
