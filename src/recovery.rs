//! Crash recovery coordination.
//!
//! This module provides [`RecoveryCoordinator`], the background task that
//! turns an engine disconnect into a rebuilt pool. It subscribes to the
//! supervisor's disconnect channel and sleeps until woken; detection is
//! push, never polling.
//!
//! # Recovery Cycle
//!
//! ```text
//! disconnect signal
//!   -> state: Restarting          (health reports false throughout)
//!   -> drain idle pages           (permits untouched)
//!   -> relaunch, capped exponential backoff until success
//!   -> reseed pages to capacity
//!   -> state: Running             (set by the successful launch)
//! ```
//!
//! Exactly one coordinator task exists per manager and it runs the whole
//! cycle inline, so rebuilds are serialized by construction; the
//! supervisor's launch lock additionally keeps the relaunch step
//! idempotent against concurrent `start()` callers. In-flight renders
//! fail fast against the dead engine and release their permits through
//! the corrupted-page path; they never block on the rebuild. Callers
//! queued on admission keep waiting and are served by the rebuilt pool,
//! because permits survive the whole cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::pool::PagePool;
use crate::supervisor::{ProcessState, ProcessSupervisor};

/// Upper bound on the relaunch backoff during an extended outage.
const MAX_RELAUNCH_BACKOFF: Duration = Duration::from_secs(10);

/// Background task that rebuilds the engine and pool after a crash.
pub struct RecoveryCoordinator;

impl RecoveryCoordinator {
    /// Spawn the recovery task.
    ///
    /// The task runs until aborted (the manager aborts it on shutdown) or
    /// until the supervisor's disconnect channel closes.
    pub fn spawn(
        supervisor: Arc<ProcessSupervisor>,
        pool: Arc<PagePool>,
        config: PoolConfig,
    ) -> JoinHandle<()> {
        let mut rx = supervisor.subscribe_disconnect();
        tokio::spawn(async move {
            loop {
                if rx.changed().await.is_err() {
                    log::debug!("Disconnect channel closed, recovery task exiting");
                    return;
                }

                // A stale signal can arrive from a previous process after
                // a rebuild already completed.
                if supervisor.is_connected() {
                    log::debug!("Ignoring stale disconnect signal");
                    continue;
                }

                log::warn!("Engine outage detected, starting recovery");
                Self::rebuild(&supervisor, &pool, &config).await;
            }
        })
    }

    /// One full drain-relaunch-reseed cycle.
    async fn rebuild(supervisor: &ProcessSupervisor, pool: &PagePool, config: &PoolConfig) {
        supervisor.set_state(ProcessState::Restarting);
        pool.drain_all().await;

        let mut backoff = config.seed_backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match supervisor.start().await {
                Ok(()) => break,
                Err(e) => {
                    log::error!("Relaunch attempt {attempt} failed: {e}, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RELAUNCH_BACKOFF);
                }
            }
        }

        pool.reseed().await;
        log::info!("Recovery complete after {attempt} launch attempt(s)");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
