//! Integration tests for the render manager lifecycle.
//!
//! These tests drive the full facade (manager, executor, pool,
//! supervisor, recovery) against the mock engine, so they run without
//! Chromium installed. The one test that needs a real browser is
//! `#[ignore]`d by default.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pagepress::engine::mock::MockLauncher;
use pagepress::{PoolConfigBuilder, RenderManager, RenderPoolError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mock_manager(launcher: &MockLauncher, capacity: usize) -> RenderManager {
    let config = PoolConfigBuilder::new()
        .max_concurrent_pages(capacity)
        .checkout_timeout(Duration::from_millis(500))
        .retry_backoff(Duration::from_millis(1))
        .seed_backoff(Duration::from_millis(5))
        .build()
        .expect("valid test configuration");
    RenderManager::builder()
        .config(config)
        .launcher(Arc::new(launcher.clone()))
        .build()
}

async fn wait_for_health(manager: &RenderManager) {
    for _ in 0..200 {
        if manager.is_healthy(None).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Manager did not become healthy in time");
}

/// A render through the whole stack produces a document with the PDF
/// magic header.
#[tokio::test]
async fn render_produces_pdf_document() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = mock_manager(&launcher, 2);
    manager.initialize().await.unwrap();

    let pdf = manager
        .render_document("<html><body><h1>Report</h1></body></html>")
        .await
        .unwrap();

    assert!(pdf.starts_with(b"%PDF-"), "Output must carry the PDF magic header");
    manager.shutdown().await;
}

/// initialize() performs its work exactly once, no matter how many
/// times or how concurrently it is called.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn initialize_is_idempotent() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = Arc::new(mock_manager(&launcher, 3));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.initialize().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    manager.initialize().await.unwrap();

    assert_eq!(launcher.launch_attempts(), 1, "Exactly one launch");
    assert_eq!(launcher.pages_created(), 3, "Exactly one seeding");
    manager.shutdown().await;
}

/// A page that fails validation is discarded and never serves another
/// render, and the page count never exceeds the ceiling.
#[tokio::test]
async fn corrupted_page_never_reenters_circulation() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = mock_manager(&launcher, 1);
    manager.initialize().await.unwrap();

    launcher.fail_next_readiness(1);
    let pdf = manager
        .render_document("<html><body>retry</body></html>")
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF-"), "Retry on a fresh page must succeed");

    assert_eq!(launcher.pages_closed(), 1, "The corrupted page was disposed");
    assert_eq!(launcher.pages_created(), 2, "A replacement took its place");

    let stats = manager.stats();
    assert!(
        stats.active <= stats.capacity,
        "Page count must stay within the ceiling, got {stats}"
    );

    manager.shutdown().await;
}

/// During an outage the manager reports unhealthy and renders fail
/// fast; after recovery both work again without any restart call.
#[tokio::test]
async fn crash_recovery_restores_service() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = mock_manager(&launcher, 2);
    manager.initialize().await.unwrap();
    assert!(manager.is_healthy(None).await);

    launcher.trigger_disconnect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!manager.is_healthy(None).await, "Unhealthy during the outage");
    let result = manager.render_document("<html></html>").await;
    assert!(
        matches!(result, Err(RenderPoolError::BrowserUnavailable)),
        "Renders during an outage fail fast, got {result:?}"
    );

    wait_for_health(&manager).await;
    // Reseeding finishes right after health flips.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(launcher.launch_attempts(), 2, "Exactly one relaunch");
    let stats = manager.stats();
    assert_eq!(stats.active, 2, "Pool rebuilt to capacity, got {stats}");

    let pdf = manager.render_document("<html><body>back</body></html>").await.unwrap();
    assert!(pdf.starts_with(b"%PDF-"));

    manager.shutdown().await;
}

/// Recovery keeps retrying the relaunch with backoff while the engine
/// refuses to come back.
#[tokio::test]
async fn recovery_survives_failed_relaunches() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = mock_manager(&launcher, 1);
    manager.initialize().await.unwrap();

    launcher.fail_next_launches(2);
    launcher.trigger_disconnect();

    wait_for_health(&manager).await;

    // Initial launch, two failed relaunches, one successful relaunch.
    assert_eq!(launcher.launch_attempts(), 4);

    let pdf = manager.render_document("<html></html>").await.unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    manager.shutdown().await;
}

/// Shutdown rejects new work, closes pages, and stops the engine.
#[tokio::test]
async fn shutdown_is_terminal_and_clean() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = mock_manager(&launcher, 2);
    manager.initialize().await.unwrap();

    manager.shutdown().await;

    assert!(matches!(
        manager.render_document("<html></html>").await,
        Err(RenderPoolError::ShuttingDown)
    ));
    assert!(matches!(
        manager.initialize().await,
        Err(RenderPoolError::ShuttingDown)
    ));
    assert!(!manager.is_healthy(None).await);
    assert_eq!(launcher.pages_closed(), 2, "Idle pages closed");
}

/// A failed initialization surfaces Init and leaves the manager ready
/// for another attempt.
#[tokio::test]
async fn failed_initialization_is_retryable() {
    init_logging();
    let launcher = MockLauncher::fail_launches(1);
    let manager = mock_manager(&launcher, 1);

    let result = manager.initialize().await;
    assert!(matches!(result, Err(RenderPoolError::Init(_))));

    manager.initialize().await.unwrap();
    let pdf = manager.render_document("<html></html>").await.unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    manager.shutdown().await;
}

/// The health probe is bounded by its timeout even when the engine
/// never answers.
#[tokio::test]
async fn health_probe_is_bounded() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = mock_manager(&launcher, 1);
    manager.initialize().await.unwrap();

    let started = Instant::now();
    let healthy = manager.is_healthy(Some(Duration::from_millis(100))).await;
    assert!(healthy);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "Probe must return promptly"
    );

    manager.shutdown().await;
}

/// End-to-end render against a real Chromium. Run explicitly with
/// `cargo test -- --ignored` on a machine with a browser available.
#[tokio::test]
#[ignore]
async fn render_with_real_chromium() {
    init_logging();
    let config = PoolConfigBuilder::new()
        .max_concurrent_pages(1)
        .launch_timeout(Duration::from_secs(60))
        .build()
        .unwrap();
    let manager = RenderManager::builder().config(config).build();
    manager.initialize().await.unwrap();

    let pdf = manager
        .render_document("<html><body><h1>Real render</h1></body></html>")
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF-"));

    manager.shutdown().await;
}
