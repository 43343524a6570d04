//! Bounded page pool with semaphore admission control.
//!
//! This module provides [`PagePool`], the owner of every rendering page.
//! A counting [`Semaphore`] is the only admission gate: exactly as many
//! permits exist as pages were seeded, so the number of concurrent
//! checkouts can never exceed the configured ceiling, with no separate
//! bookkeeping to drift out of sync.
//!
//! # Permit Accounting
//!
//! The semaphore is created empty. [`seed`](PagePool::seed) adds one
//! permit per page once the full set exists; after that the total number
//! of permits (free + held) never changes. Recovery drains and recreates
//! *pages*, never permits, which is what lets callers that were queued
//! across a crash be served by the rebuilt pool without any hand-off
//! logic.
//!
//! # Page Flow
//!
//! ```text
//! checkout: permit -> pop idle -> liveness check -> lease
//!                      (dead pages disposed and skipped)
//!                      (empty idle -> page created on demand)
//! release:  reusable -> reset to blank -> push idle -> permit back
//!           corrupted -> close -> replace -> permit back
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::engine::RenderPage;
use crate::engine::chromium::BLANK_DOCUMENT;
use crate::error::{RenderPoolError, Result};
use crate::lease::PageLease;
use crate::stats::PoolStats;
use crate::supervisor::ProcessSupervisor;

/// Global page id sequence, for log correlation.
static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A page together with its pool bookkeeping.
pub struct PooledPage {
    id: u64,
    page: Arc<dyn RenderPage>,
    created_at: Instant,
}

impl PooledPage {
    fn new(page: Arc<dyn RenderPage>) -> Self {
        Self {
            id: NEXT_PAGE_ID.fetch_add(1, Ordering::SeqCst),
            page,
            created_at: Instant::now(),
        }
    }

    /// Unique id of this page, for log correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The underlying rendering page.
    pub fn page(&self) -> &Arc<dyn RenderPage> {
        &self.page
    }

    /// When this page was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl std::fmt::Debug for PooledPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledPage")
            .field("id", &self.id)
            .field("age", &self.created_at.elapsed())
            .finish()
    }
}

/// Bounded pool of rendering pages.
///
/// Created by the manager around a shared [`ProcessSupervisor`]. All
/// checkout, release, and lifecycle bookkeeping lives here; rendering
/// itself is the executor's job.
pub struct PagePool {
    supervisor: Arc<ProcessSupervisor>,
    config: PoolConfig,
    admission: Arc<Semaphore>,
    idle: std::sync::Mutex<VecDeque<PooledPage>>,
    // Pages in existence (idle + checked out), plus slots reserved for
    // in-flight creations. Never exceeds capacity; falls below it only
    // while replacement creation has been failing.
    active: AtomicUsize,
    seeded: AtomicBool,
}

impl PagePool {
    /// Create an empty, unseeded pool.
    pub fn new(supervisor: Arc<ProcessSupervisor>, config: PoolConfig) -> Self {
        Self {
            supervisor,
            config,
            admission: Arc::new(Semaphore::new(0)),
            idle: std::sync::Mutex::new(VecDeque::new()),
            active: AtomicUsize::new(0),
            seeded: AtomicBool::new(false),
        }
    }

    /// Configured concurrency ceiling.
    pub fn capacity(&self) -> usize {
        self.config.max_concurrent_pages
    }

    /// Pre-create the full set of pages and open admission.
    ///
    /// All-or-nothing: permits are only added once every page exists, so
    /// a failed seed leaves the pool closed and safely re-seedable.
    ///
    /// # Errors
    ///
    /// Returns [`RenderPoolError::Init`] if any page cannot be created
    /// within the configured retry budget. Pages created before the
    /// failure are closed.
    pub async fn seed(&self) -> Result<()> {
        if self.seeded.swap(true, Ordering::SeqCst) {
            log::debug!("Pool already seeded, seed() is a no-op");
            return Ok(());
        }

        let capacity = self.capacity();
        log::info!("Seeding pool with {capacity} pages...");

        let mut created: Vec<PooledPage> = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            match self.create_page_with_retry().await {
                Ok(page) => created.push(PooledPage::new(page)),
                Err(e) => {
                    log::error!("Pool seeding failed: {e}");
                    for pooled in created {
                        let _ = pooled.page.close().await;
                    }
                    self.seeded.store(false, Ordering::SeqCst);
                    return Err(RenderPoolError::Init(format!(
                        "failed to seed page pool: {e}"
                    )));
                }
            }
        }

        self.active.store(capacity, Ordering::SeqCst);
        self.idle.lock().unwrap().extend(created);
        self.admission.add_permits(capacity);

        log::info!("Pool seeded, admission open with {capacity} permits");
        Ok(())
    }

    /// Recreate pages up to capacity after a recovery drain.
    ///
    /// Permits are deliberately untouched; callers that queued across the
    /// outage are served as soon as pages exist again. Best effort: a
    /// persistent creation failure leaves the pool short, and checkout's
    /// on-demand creation heals the gap later.
    pub async fn reseed(&self) {
        let mut restored = 0usize;
        while self.try_reserve_slot() {
            match self.create_page_with_retry().await {
                Ok(page) => {
                    let pooled = PooledPage::new(page);
                    log::debug!("Reseeded page #{}", pooled.id);
                    self.idle.lock().unwrap().push_back(pooled);
                    restored += 1;
                }
                Err(e) => {
                    self.decrement_active();
                    log::error!("Stopping reseed early, page creation failing: {e}");
                    break;
                }
            }
        }
        log::info!("Restored {restored} pages to the pool");
    }

    /// Create one page, retrying with exponential backoff.
    async fn create_page_with_retry(&self) -> Result<Arc<dyn RenderPage>> {
        let mut last_error = RenderPoolError::Init("no creation attempt made".to_string());
        for attempt in 0..self.config.seed_attempts {
            if attempt > 0 {
                let backoff = self.config.seed_backoff * 2u32.pow(attempt - 1);
                log::debug!("Retrying page creation in {backoff:?} (attempt {})", attempt + 1);
                tokio::time::sleep(backoff).await;
            }
            match self.supervisor.engine()?.new_page().await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    log::warn!("Page creation attempt {} failed: {e}", attempt + 1);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Check a page out of the pool, waiting up to `timeout` for a permit.
    ///
    /// The returned [`PageLease`] is validated live; dead idle pages are
    /// disposed and replaced inside this call without consuming an extra
    /// permit, so the caller never sees them.
    ///
    /// # Errors
    ///
    /// - [`RenderPoolError::BrowserUnavailable`] if the engine is down
    ///   (checked before queuing, so outages fail fast).
    /// - [`RenderPoolError::PoolExhausted`] if no permit frees up in time.
    /// - [`RenderPoolError::ShuttingDown`] if admission has been closed.
    pub async fn checkout(self: &Arc<Self>, timeout: Duration) -> Result<PageLease> {
        if !self.supervisor.is_connected() {
            return Err(RenderPoolError::BrowserUnavailable);
        }

        let permit =
            match tokio::time::timeout(timeout, Arc::clone(&self.admission).acquire_owned()).await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(RenderPoolError::ShuttingDown),
                Err(_) => {
                    log::debug!("Checkout timed out after {timeout:?}");
                    return Err(RenderPoolError::PoolExhausted);
                }
            };

        loop {
            let candidate = self.idle.lock().unwrap().pop_front();
            match candidate {
                Some(pooled) => {
                    if pooled.page.is_alive().await {
                        log::debug!("Checked out page #{}", pooled.id);
                        return Ok(PageLease::new(Arc::clone(self), pooled, permit));
                    }
                    log::warn!("Idle page #{} failed liveness check, disposing", pooled.id);
                    self.dispose(pooled).await;
                    // Next idle page, or a fresh one.
                }
                None => {
                    // A held permit with an empty idle queue means fewer
                    // pages exist than permits; restore one on demand.
                    if !self.try_reserve_slot() {
                        // Another creation holds the last slot; its page
                        // lands in idle shortly.
                        tokio::task::yield_now().await;
                        continue;
                    }
                    let pooled = self.create_reserved_page().await?;
                    log::debug!("Created page #{} on demand", pooled.id);
                    return Ok(PageLease::new(Arc::clone(self), pooled, permit));
                }
            }
        }
    }

    /// Return a page to the pool and, last of all, its permit.
    ///
    /// Reusable pages are reset to a blank document first; a failed reset
    /// demotes the page to the corrupted path. Corrupted pages are closed
    /// and a replacement is attempted before the permit frees, so the
    /// next caller admitted finds a page waiting.
    pub(crate) async fn release(
        &self,
        pooled: PooledPage,
        reusable: bool,
        permit: OwnedSemaphorePermit,
    ) {
        let mut reusable = reusable;
        if reusable {
            if let Err(e) = pooled.page.set_content(BLANK_DOCUMENT).await {
                log::warn!("Failed to reset page #{}, disposing: {e}", pooled.id);
                reusable = false;
            }
        }

        if reusable {
            log::debug!("Returned page #{} to the pool", pooled.id);
            self.idle.lock().unwrap().push_back(pooled);
        } else {
            self.dispose(pooled).await;
            self.try_replace().await;
        }

        drop(permit);
    }

    /// Close a page and drop it from the count.
    async fn dispose(&self, pooled: PooledPage) {
        log::debug!("Disposing page #{}", pooled.id);
        let _ = pooled.page.close().await;
        self.decrement_active();
    }

    /// Attempt a single replacement for a disposed page.
    ///
    /// Failure shrinks the effective pool until recovery or on-demand
    /// creation restores it; the permit still frees either way.
    async fn try_replace(&self) {
        if !self.try_reserve_slot() {
            log::debug!("Pool already back at capacity, skipping replacement");
            return;
        }
        match self.create_reserved_page().await {
            Ok(pooled) => {
                log::debug!("Replacement page #{} created", pooled.id);
                self.idle.lock().unwrap().push_back(pooled);
            }
            Err(e) => {
                log::warn!("Replacement page creation failed: {e}");
            }
        }
    }

    /// Claim a page slot if the count is still below capacity.
    ///
    /// Every page creation outside the initial seed reserves its slot
    /// through here *before* the engine call, so two concurrent creations
    /// cannot both read a stale count and overshoot the ceiling. A
    /// reservation whose creation fails is returned via
    /// [`decrement_active`](Self::decrement_active).
    fn try_reserve_slot(&self) -> bool {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < self.capacity()).then(|| count + 1)
            })
            .is_ok()
    }

    /// Create a page for a slot already reserved, releasing the slot on
    /// failure.
    async fn create_reserved_page(&self) -> Result<PooledPage> {
        let engine = match self.supervisor.engine() {
            Ok(engine) => engine,
            Err(e) => {
                self.decrement_active();
                return Err(e);
            }
        };
        match engine.new_page().await {
            Ok(page) => Ok(PooledPage::new(page)),
            Err(e) => {
                self.decrement_active();
                Err(e)
            }
        }
    }

    /// Close every idle page and drop them from the count.
    ///
    /// Permits are untouched. Pages still checked out stay counted until
    /// their own release disposes them; they fail against the dead engine
    /// and come back through the corrupted path.
    pub async fn drain_all(&self) {
        let drained: Vec<PooledPage> = {
            let mut idle = self.idle.lock().unwrap();
            idle.drain(..).collect()
        };

        let count = drained.len();
        for pooled in drained {
            let _ = pooled.page.close().await;
            self.decrement_active();
        }
        log::info!("Drained {count} idle pages");
    }

    /// Close admission: queued and future checkouts fail `ShuttingDown`.
    pub fn close(&self) {
        self.admission.close();
        log::info!("Pool admission closed");
    }

    /// Snapshot of the pool state.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().unwrap().len(),
            active: self.active.load(Ordering::SeqCst),
            capacity: self.capacity(),
        }
    }

    fn decrement_active(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
