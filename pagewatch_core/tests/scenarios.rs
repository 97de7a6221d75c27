//! End-to-end scenarios driving the full capture pipeline (renderer →
//! normalize → diff → version engine → alert) through the public API,
//! rather than exercising any single module in isolation.

use pagewatch_core::{
    CaptureOptions, ChangeType, Competitor, CompetitorRepository, InMemoryStore, Orchestrator,
    PageWatchConfig, SimulateRendererGateway, SnapshotRepository, Severity, Telemetry,
};
use std::sync::Arc;

async fn new_orchestrator(config: PageWatchConfig) -> (Orchestrator, Arc<InMemoryStore>, Arc<SimulateRendererGateway>) {
    let store = Arc::new(InMemoryStore::new());
    let renderer = Arc::new(SimulateRendererGateway::new());
    let competitor = Competitor::new("c1", "example.com").with_owner_user_id("u1");
    store.insert_competitor(competitor).await;
    let orchestrator = Orchestrator::new(store.clone(), store.clone(), renderer.clone(), config, Arc::new(Telemetry::new()));
    (orchestrator, store, renderer)
}

#[tokio::test]
async fn s1_initial_capture_creates_full_baseline() {
    let (orchestrator, store, renderer) = new_orchestrator(PageWatchConfig::new()).await;
    renderer.set_page("https://example.com", "<html><body><h1>v1</h1></body></html>").await;

    let result = orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();
    assert_eq!(result.version_number, 1);
    assert!(!result.changes_detected);
    assert!(!result.alert_created);
    assert_eq!(result.severity, Severity::Low);

    let snapshot = store.get_by_version("c1", 1).await.unwrap().unwrap();
    assert!(snapshot.is_full_version);
    assert!(snapshot.is_current);
    assert_eq!(snapshot.change_type, ChangeType::Other);
    assert_eq!(snapshot.change_summary, "initial capture");
}

#[tokio::test]
async fn s2_byte_identical_recapture_writes_nothing() {
    let (orchestrator, store, renderer) = new_orchestrator(PageWatchConfig::new()).await;
    let html = "<html><body><h1>v1</h1></body></html>";
    renderer.set_page("https://example.com", html).await;
    orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();

    let result = orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();
    assert!(!result.changes_detected);
    assert_eq!(result.version_number, 1);

    let competitor = store.get("c1").await.unwrap().unwrap();
    assert!(competitor.last_checked_at.is_some());
}

#[tokio::test]
async fn s3_cosmetic_only_change_is_not_recorded() {
    let (orchestrator, store, renderer) = new_orchestrator(PageWatchConfig::new()).await;
    renderer.set_page("https://example.com", "<html><body><h1>v1</h1></body></html>").await;
    orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();

    renderer
        .set_page(
            "https://example.com",
            "<html><body><!-- random --><h1>v1</h1><script>console.log(Date.now())</script></body></html>",
        )
        .await;
    let result = orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();

    assert!(!result.changes_detected);
    assert_eq!(store.list("c1", pagewatch_core::ListOrder::Ascending).await.unwrap().len(), 1);
}

#[tokio::test]
async fn s4_significant_change_writes_new_version_and_alert() {
    let (orchestrator, store, renderer) = new_orchestrator(PageWatchConfig::new()).await;
    renderer.set_page("https://example.com", "<html><body><h1>v1</h1></body></html>").await;
    orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();

    let paragraph = "p".repeat(200);
    renderer
        .set_page(
            "https://example.com",
            &format!("<html><body><h1>v1</h1><p>{}</p></body></html>", paragraph),
        )
        .await;
    let result = orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();

    assert!(result.changes_detected);
    assert_eq!(result.version_number, 2);
    assert!(result.alert_created);

    let alerts = store.list_alerts("c1").await.unwrap();
    assert_eq!(alerts.last().unwrap().alert_type, pagewatch_core::AlertType::ContentChange);

    let first = store.get_by_version("c1", 1).await.unwrap().unwrap();
    let second = store.get_by_version("c1", 2).await.unwrap().unwrap();
    assert!(!first.is_current);
    assert!(second.is_current);
}

#[tokio::test]
async fn s5_full_diff_cadence_follows_the_configured_interval() {
    let config = PageWatchConfig::new()
        .with_full_version_interval(3)
        .with_significant_change_threshold(10);
    let (orchestrator, store, renderer) = new_orchestrator(config).await;

    for n in 0..10u32 {
        let body = format!("<p>{}</p>", "x".repeat(50 + n as usize * 10));
        renderer.set_page("https://example.com", &format!("<html><body>{}</body></html>", body)).await;
        orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();
    }

    for version in [1, 3, 6, 9] {
        let snapshot = store.get_by_version("c1", version).await.unwrap().unwrap();
        assert!(snapshot.is_full_version, "version {} should be full", version);
    }
    for version in [2, 4, 5, 7, 8, 10] {
        let snapshot = store.get_by_version("c1", version).await.unwrap().unwrap();
        assert!(!snapshot.is_full_version, "version {} should be a diff", version);
    }
}

#[tokio::test]
async fn s6_reconstruction_is_byte_exact_across_a_diff_chain() {
    let config = PageWatchConfig::new()
        .with_full_version_interval(9)
        .with_significant_change_threshold(10);
    let (orchestrator, store, renderer) = new_orchestrator(config).await;

    let mut bodies = Vec::new();
    for n in 0..10u32 {
        let body = format!("<html><body><p>{}</p></body></html>", "x".repeat(50 + n as usize * 15));
        bodies.push(body.clone());
        renderer.set_page("https://example.com", &body).await;
        orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();
    }

    let reconstructed = pagewatch_core::version_engine::reconstruct(
        &(store.clone() as Arc<dyn pagewatch_core::SnapshotRepository>),
        "c1",
        7,
    )
    .await
    .unwrap();

    let normalized_expected = pagewatch_core::normalize::normalize(&bodies[6]);
    assert_eq!(reconstructed, normalized_expected);
}

#[tokio::test]
async fn s7_retention_promotes_the_next_full_snapshot() {
    let config = PageWatchConfig::new()
        .with_full_version_interval(3)
        .with_max_versions_per_competitor(3)
        .with_significant_change_threshold(10);
    let (orchestrator, store, renderer) = new_orchestrator(config).await;

    for n in 0..4u32 {
        let body = format!("<html><body><p>{}</p></body></html>", "x".repeat(50 + n as usize * 20));
        renderer.set_page("https://example.com", &body).await;
        orchestrator.capture("c1", CaptureOptions::default()).await.unwrap();
    }

    assert!(store.get_by_version("c1", 1).await.unwrap().is_none());
    let promoted = store.get_by_version("c1", 2).await.unwrap().unwrap();
    assert!(promoted.is_full_version);
    assert!(promoted.full_html.is_some());

    for version in [2, 3, 4] {
        pagewatch_core::version_engine::reconstruct(
            &(store.clone() as Arc<dyn pagewatch_core::SnapshotRepository>),
            "c1",
            version,
        )
        .await
        .unwrap();
    }
}
