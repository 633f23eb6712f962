//! End-to-end tests for the HTTP surface
//!
//! Each test binds the full router to an ephemeral port and drives it with
//! a real HTTP client, against mocked feed and destination servers:
//! - Trigger, poll status, fetch the final report
//! - Conflict on a second trigger while a run is active
//! - Run-fatal errors surfacing through the status endpoint
//! - Scheduler dispatching runs without an HTTP trigger

use feedsync_engine::config::{FeedSource, RetryConfig, SyncConfig};
use feedsync_engine::SyncEngine;
use feedsync_server::config::{AppConfig, SchedulerConfig};
use feedsync_server::{routes, scheduler, state::AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Engine configuration wired to the two mock servers, with pacing and
/// backoff turned down so tests run fast
fn engine_config(feed: &MockServer, dest: &MockServer) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.sources = vec![FeedSource::csv("primary", format!("{}/feed.csv", feed.uri()))];
    config.destination.base_url = format!("{}/api", dest.uri());
    config.destination.token = "test-token".to_string();
    config.batch_size = 2;
    config.call_spacing_ms = 0;
    config.batch_pause_ms = 0;
    config.batch_pause_jitter_ms = 0;
    config.retry = RetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
    };
    config
}

async fn mount_feed(feed: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/feed.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(feed)
        .await;
}

/// Catch-all read mock serving the connectivity check and all SKU searches
async fn mount_empty_reads(dest: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(dest)
        .await;
}

async fn mount_create(dest: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/products"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 100, "sku": "created"})),
        )
        .mount(dest)
        .await;
}

/// Serve the full router on an ephemeral port, returning its base URL
async fn serve_app(state: AppState) -> String {
    let app = routes::create_router(state, &AppConfig::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Poll the report endpoint until the background run has published one
async fn wait_for_report(client: &reqwest::Client, base: &str) -> Value {
    for _ in 0..200 {
        let response = client
            .get(format!("{base}/api/v1/sync/report"))
            .send()
            .await
            .unwrap();
        if response.status().is_success() {
            return response.json().await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run never published a report");
}

#[tokio::test]
async fn test_trigger_then_poll_status_then_fetch_report() {
    let feed = MockServer::start().await;
    let dest = MockServer::start().await;

    mount_feed(
        &feed,
        "sku;name;price;stock\nE2E-1;Widget;10,00;3\nE2E-2;Gadget;5.50;0\n",
    )
    .await;
    mount_empty_reads(&dest).await;
    mount_create(&dest).await;

    let engine = Arc::new(SyncEngine::new(engine_config(&feed, &dest)).unwrap());
    let state = AppState::new(engine);
    let base = serve_app(state).await;
    let client = reqwest::Client::new();

    let trigger = client
        .post(format!("{base}/api/v1/sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(trigger.status(), 202);
    let ack: Value = trigger.json().await.unwrap();
    assert_eq!(ack["status"], "started");
    assert!(ack["runId"].is_string());

    let report = wait_for_report(&client, &base).await;
    assert_eq!(report["success"], true);
    assert_eq!(report["sourceUsed"], "primary");
    assert_eq!(report["stats"]["total"], 2);
    assert_eq!(report["stats"]["created"], 2);
    assert_eq!(report["stats"]["errors"], 0);

    let status: Value = client
        .get(format!("{base}/api/v1/sync/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "completed");
    assert_eq!(status["stats"]["processed"], 2);
    assert_eq!(status["lastError"], Value::Null);
}

#[tokio::test]
async fn test_second_trigger_conflicts_while_run_is_active() {
    let feed = MockServer::start().await;
    let dest = MockServer::start().await;

    // Slow feed keeps the first run in flight while the second trigger lands
    Mock::given(method("GET"))
        .and(path("/feed.csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("sku;name;price\nSLOW-1;Widget;10.00\n")
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&feed)
        .await;
    mount_empty_reads(&dest).await;
    mount_create(&dest).await;

    let engine = Arc::new(SyncEngine::new(engine_config(&feed, &dest)).unwrap());
    let state = AppState::new(engine);
    let base = serve_app(state).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base}/api/v1/sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 202);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = client
        .post(format!("{base}/api/v1/sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"]["code"], "ALREADY_RUNNING");

    // The rejected trigger must not have disturbed the first run
    let report = wait_for_report(&client, &base).await;
    assert_eq!(report["success"], true);
    assert_eq!(report["stats"]["created"], 1);
}

#[tokio::test]
async fn test_feed_failure_surfaces_through_status() {
    let feed = MockServer::start().await;
    let dest = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.csv"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&feed)
        .await;
    mount_empty_reads(&dest).await;

    let engine = Arc::new(SyncEngine::new(engine_config(&feed, &dest)).unwrap());
    let state = AppState::new(engine);
    let base = serve_app(state).await;
    let client = reqwest::Client::new();

    let trigger = client
        .post(format!("{base}/api/v1/sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(trigger.status(), 202);

    // Poll until the aborted run has recorded its error
    let mut status = Value::Null;
    for _ in 0..200 {
        status = client
            .get(format!("{base}/api/v1/sync/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if !status["lastError"].is_null() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    assert_eq!(status["state"], "failed");
    let last_error = status["lastError"].as_str().unwrap();
    assert!(last_error.contains("feed sources failed"));

    // No run ever completed, so there is still no report
    let report = client
        .get(format!("{base}/api/v1/sync/report"))
        .send()
        .await
        .unwrap();
    assert_eq!(report.status(), 404);
}

#[tokio::test]
async fn test_scheduler_dispatches_run_without_http_trigger() {
    let feed = MockServer::start().await;
    let dest = MockServer::start().await;

    mount_feed(&feed, "sku;name;price\nCRON-1;Widget;10.00\n").await;
    mount_empty_reads(&dest).await;
    mount_create(&dest).await;

    let engine = Arc::new(SyncEngine::new(engine_config(&feed, &dest)).unwrap());
    let state = AppState::new(engine);
    let handle = scheduler::spawn(
        state.clone(),
        SchedulerConfig {
            enabled: true,
            interval_secs: 1,
        },
    )
    .unwrap();

    let mut report = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        report = state.last_report.read().await.clone();
        if report.is_some() {
            break;
        }
    }
    handle.abort();

    let report = report.expect("scheduler never produced a report");
    assert!(report.success);
    assert_eq!(report.stats.created, 1);
}
