//! Concurrency tests for admission control and backpressure.
//!
//! These tests verify the hard concurrency ceiling: with N pages, at
//! most N renders execute at once, the (N+1)-th caller queues, and
//! queued callers shed with `PoolExhausted` once their timeout elapses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pagepress::engine::mock::MockLauncher;
use pagepress::{PoolConfigBuilder, RenderManager, RenderPoolError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn mock_manager(
    launcher: &MockLauncher,
    capacity: usize,
    checkout_timeout: Duration,
) -> RenderManager {
    let config = PoolConfigBuilder::new()
        .max_concurrent_pages(capacity)
        .checkout_timeout(checkout_timeout)
        .retry_backoff(Duration::from_millis(1))
        .build()
        .expect("valid test configuration");
    RenderManager::builder()
        .config(config)
        .launcher(Arc::new(launcher.clone()))
        .build()
}

/// With N pages and M > N concurrent callers, every render succeeds,
/// no more than N pages ever exist, and no extra pages are created.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn ceiling_holds_under_oversubscription() {
    init_logging();
    let launcher = MockLauncher::new();
    // Generous checkout timeout: callers queue instead of shedding.
    let manager = Arc::new(mock_manager(&launcher, 2, Duration::from_secs(10)));
    manager.initialize().await.unwrap();

    launcher.set_render_delay(Duration::from_millis(50));

    let mut handles = Vec::new();
    for i in 0..6 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .render_document(&format!("<html><body>doc {i}</body></html>"))
                .await
        }));
    }

    for handle in handles {
        let pdf = handle.await.unwrap().unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
    }

    assert_eq!(launcher.renders_completed(), 6, "Every caller was served");
    assert!(
        launcher.peak_concurrent_renders() <= 2,
        "At most 2 renders may overlap, saw {}",
        launcher.peak_concurrent_renders()
    );
    assert_eq!(
        launcher.pages_created(),
        2,
        "Oversubscription must not create pages beyond the ceiling"
    );
    let stats = manager.stats();
    assert!(stats.active <= stats.capacity);

    manager.shutdown().await;
}

/// With a pool of two and both pages held, a third caller with a 100ms
/// timeout fails PoolExhausted while the first two succeed.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn third_caller_sheds_after_timeout() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = Arc::new(mock_manager(&launcher, 2, Duration::from_millis(100)));
    manager.initialize().await.unwrap();

    // Long renders keep both pages checked out.
    launcher.set_render_delay(Duration::from_millis(400));

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.render_document("<html>a</html>").await })
    };
    let second = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.render_document("<html>b</html>").await })
    };

    // Let both claim their pages.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let third = manager.render_document("<html>c</html>").await;
    let waited = started.elapsed();

    assert!(
        matches!(third, Err(RenderPoolError::PoolExhausted)),
        "Third caller must shed, got {third:?}"
    );
    assert!(
        waited >= Duration::from_millis(100),
        "Shedding must wait out the full checkout timeout, waited {waited:?}"
    );
    assert!(
        waited < Duration::from_millis(350),
        "Shedding must not wait for a page to free up, waited {waited:?}"
    );

    assert!(first.await.unwrap().unwrap().starts_with(b"%PDF-"));
    assert!(second.await.unwrap().unwrap().starts_with(b"%PDF-"));

    manager.shutdown().await;
}

/// A queued caller is served as soon as a page frees, well before its
/// timeout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_caller_gets_freed_page() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = Arc::new(mock_manager(&launcher, 1, Duration::from_secs(5)));
    manager.initialize().await.unwrap();

    launcher.set_render_delay(Duration::from_millis(150));

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.render_document("<html>slow</html>").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Queued behind the single page; served after ~100ms more.
    let pdf = manager.render_document("<html>queued</html>").await.unwrap();
    assert!(pdf.starts_with(b"%PDF-"));

    assert!(first.await.unwrap().unwrap().starts_with(b"%PDF-"));
    assert_eq!(launcher.pages_created(), 1, "Both renders shared one page");

    manager.shutdown().await;
}

/// Concurrent renders on a healthy pool reuse the seeded pages; no
/// creation or disposal churn.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn sustained_load_reuses_pages() {
    init_logging();
    let launcher = MockLauncher::new();
    let manager = Arc::new(mock_manager(&launcher, 4, Duration::from_secs(10)));
    manager.initialize().await.unwrap();

    let mut handles = Vec::new();
    for round in 0..5 {
        for i in 0..4 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .render_document(&format!("<html><body>{round}-{i}</body></html>"))
                    .await
            }));
        }
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(launcher.renders_completed(), 20);
    assert_eq!(launcher.pages_created(), 4, "Healthy pages are reused forever");
    assert_eq!(launcher.pages_closed(), 0, "No disposal churn under load");

    manager.shutdown().await;
}
