//! Browser process supervision.
//!
//! This module provides [`ProcessSupervisor`], the owner of the single
//! rendering engine process. It tracks the process lifecycle state,
//! launches the process with a bounded timeout, and converts the engine's
//! disconnect signal into state transitions and a stable notification
//! channel that survives relaunches.
//!
//! # State Machine
//!
//! ```text
//! Unstarted --start()--> Running --disconnect--> Disconnected
//!                           ^                         |
//!                           |                    (recovery)
//!                           +----- Restarting <-------+
//! ```
//!
//! The supervisor performs no recovery itself; the recovery coordinator
//! subscribes to [`subscribe_disconnect`](ProcessSupervisor::subscribe_disconnect)
//! and drives the `Disconnected -> Restarting -> Running` edge.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::PoolConfig;
use crate::engine::{EngineLauncher, RenderEngine};
use crate::error::{RenderPoolError, Result};

/// Lifecycle state of the rendering engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No process has been launched yet (or the supervisor was stopped).
    Unstarted,
    /// Process is launched and the connection is believed live.
    Running,
    /// The connection was lost; recovery has not yet begun.
    Disconnected,
    /// Recovery is rebuilding the process.
    Restarting,
}

/// State shared with the disconnect-forwarder tasks.
struct SupervisorShared {
    state: std::sync::Mutex<ProcessState>,
    engine: std::sync::Mutex<Option<Arc<dyn RenderEngine>>>,
    disconnect_tx: watch::Sender<u64>,
}

/// Owner of the single rendering engine process.
///
/// Holds the launcher, the current engine handle, and the lifecycle
/// state. All pool page creation goes through
/// [`engine()`](Self::engine); the health probe and checkout guard read
/// [`is_connected()`](Self::is_connected).
pub struct ProcessSupervisor {
    launcher: Arc<dyn EngineLauncher>,
    config: PoolConfig,
    shared: Arc<SupervisorShared>,
    // Serializes launches so concurrent start() calls stay idempotent.
    launch_lock: tokio::sync::Mutex<()>,
}

impl ProcessSupervisor {
    /// Create a supervisor in the `Unstarted` state.
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: PoolConfig) -> Self {
        let (disconnect_tx, _) = watch::channel(0u64);
        Self {
            launcher,
            config,
            shared: Arc::new(SupervisorShared {
                state: std::sync::Mutex::new(ProcessState::Unstarted),
                engine: std::sync::Mutex::new(None),
                disconnect_tx,
            }),
            launch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Launch the engine process, bounded by the configured launch timeout.
    ///
    /// Idempotent: if the process is already running and connected, this
    /// returns without side effects. Concurrent calls are serialized and
    /// the losers observe the winner's launch.
    ///
    /// # Errors
    ///
    /// Returns [`RenderPoolError::Init`] if the launch fails or does not
    /// reach a connected state within
    /// [`launch_timeout`](PoolConfig::launch_timeout).
    pub async fn start(&self) -> Result<()> {
        let _guard = self.launch_lock.lock().await;

        if self.is_connected() {
            log::debug!("Engine already running, start() is a no-op");
            return Ok(());
        }

        log::info!("Launching rendering engine...");
        let engine = tokio::time::timeout(
            self.config.launch_timeout,
            self.launcher.launch(&self.config),
        )
        .await
        .map_err(|_| {
            RenderPoolError::Init(format!(
                "engine did not reach a connected state within {:?}",
                self.config.launch_timeout
            ))
        })??;

        *self.shared.engine.lock().unwrap() = Some(Arc::clone(&engine));
        *self.shared.state.lock().unwrap() = ProcessState::Running;

        self.spawn_disconnect_forwarder(&engine);
        log::info!("Rendering engine is running");
        Ok(())
    }

    /// Forward the engine's disconnect signal onto the supervisor's
    /// stable channel and flip the state to `Disconnected`.
    ///
    /// One forwarder is spawned per launch; it fires at most once. The
    /// supervisor channel outlives relaunches, so subscribers never need
    /// to resubscribe.
    fn spawn_disconnect_forwarder(&self, engine: &Arc<dyn RenderEngine>) {
        let mut rx = engine.subscribe_disconnect();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            if rx.changed().await.is_err() {
                // Engine dropped its channel; nothing to report.
                return;
            }
            {
                let mut state = shared.state.lock().unwrap();
                // A stop() or an in-progress restart wins over a stale
                // signal from the previous process.
                if *state == ProcessState::Running {
                    *state = ProcessState::Disconnected;
                }
            }
            log::warn!("Engine disconnect detected, notifying subscribers");
            shared.disconnect_tx.send_modify(|generation| *generation += 1);
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        *self.shared.state.lock().unwrap()
    }

    /// Transition the lifecycle state. Used by the recovery coordinator.
    pub(crate) fn set_state(&self, state: ProcessState) {
        log::debug!("Engine state transition -> {state:?}");
        *self.shared.state.lock().unwrap() = state;
    }

    /// Whether the process is launched and the connection is believed
    /// live. Cheap, no round trip.
    pub fn is_connected(&self) -> bool {
        if self.state() != ProcessState::Running {
            return false;
        }
        self.shared
            .engine
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|engine| engine.is_connected())
    }

    /// Handle to the current engine.
    ///
    /// # Errors
    ///
    /// Returns [`RenderPoolError::BrowserUnavailable`] while the process
    /// is not in the `Running` state.
    pub fn engine(&self) -> Result<Arc<dyn RenderEngine>> {
        if self.state() != ProcessState::Running {
            return Err(RenderPoolError::BrowserUnavailable);
        }
        self.shared
            .engine
            .lock()
            .unwrap()
            .clone()
            .ok_or(RenderPoolError::BrowserUnavailable)
    }

    /// Subscribe to disconnect notifications.
    ///
    /// The channel is owned by the supervisor and survives relaunches;
    /// the carried generation counter increases once per disconnect.
    pub fn subscribe_disconnect(&self) -> watch::Receiver<u64> {
        self.shared.disconnect_tx.subscribe()
    }

    /// Stop the engine process and return to `Unstarted`.
    pub async fn stop(&self) {
        let _guard = self.launch_lock.lock().await;

        self.set_state(ProcessState::Unstarted);
        let engine = self.shared.engine.lock().unwrap().take();
        if let Some(engine) = engine {
            if let Err(e) = engine.close().await {
                log::warn!("Error stopping engine: {e}");
            }
        }
        log::info!("Engine supervisor stopped");
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockLauncher;

    fn supervisor_with(launcher: MockLauncher) -> ProcessSupervisor {
        ProcessSupervisor::new(Arc::new(launcher), PoolConfig::default())
    }

    /// Verifies the initial state before any launch.
    #[tokio::test]
    async fn test_initial_state() {
        let supervisor = supervisor_with(MockLauncher::new());

        assert_eq!(supervisor.state(), ProcessState::Unstarted);
        assert!(!supervisor.is_connected());
        assert!(matches!(
            supervisor.engine(),
            Err(RenderPoolError::BrowserUnavailable)
        ));
    }

    /// Verifies that start() is idempotent while the process is live.
    #[tokio::test]
    async fn test_start_idempotent() {
        let launcher = MockLauncher::new();
        let supervisor = supervisor_with(launcher.clone());

        supervisor.start().await.unwrap();
        supervisor.start().await.unwrap();
        supervisor.start().await.unwrap();

        assert_eq!(launcher.launch_attempts(), 1, "Only one launch expected");
        assert_eq!(supervisor.state(), ProcessState::Running);
        assert!(supervisor.is_connected());
        assert!(supervisor.engine().is_ok());
    }

    /// Verifies that a launch failure surfaces as Init and leaves the
    /// supervisor startable.
    #[tokio::test]
    async fn test_start_failure() {
        let launcher = MockLauncher::fail_launches(1);
        let supervisor = supervisor_with(launcher.clone());

        let result = supervisor.start().await;
        assert!(matches!(result, Err(RenderPoolError::Init(_))));
        assert!(!supervisor.is_connected());

        // The scripted failure is consumed; the retry succeeds.
        supervisor.start().await.unwrap();
        assert!(supervisor.is_connected());
    }

    /// Verifies that a disconnect flips the state and notifies
    /// subscribers through the supervisor's stable channel.
    #[tokio::test]
    async fn test_disconnect_transition() {
        let launcher = MockLauncher::new();
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();

        let mut rx = supervisor.subscribe_disconnect();
        launcher.trigger_disconnect();
        rx.changed().await.unwrap();

        assert_eq!(supervisor.state(), ProcessState::Disconnected);
        assert!(!supervisor.is_connected());
        assert!(matches!(
            supervisor.engine(),
            Err(RenderPoolError::BrowserUnavailable)
        ));
    }

    /// Verifies stop() returns the supervisor to Unstarted.
    #[tokio::test]
    async fn test_stop() {
        let launcher = MockLauncher::new();
        let supervisor = supervisor_with(launcher.clone());
        supervisor.start().await.unwrap();

        supervisor.stop().await;

        assert_eq!(supervisor.state(), ProcessState::Unstarted);
        assert!(!supervisor.is_connected());
    }
}
