//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for both the collection service and
//! the CDN, and exercise page tasks end-to-end against a temporary export
//! directory.

use async_trait::async_trait;
use pin_harvest::crawler::{
    build_asset_client, build_http_client, build_runner, Controller, CrawlTask, PageClient,
    PageTaskRunner, Session, TaskHandler, TaskOutcome,
};
use pin_harvest::export::{AssetMaterializer, MaterializeOutcome, MetadataTagger, SkipLog, TagError};
use pin_harvest::{Config, PinRecord};
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tagger that fails for the configured links
struct StubTagger {
    failing_links: HashSet<String>,
}

#[async_trait]
impl MetadataTagger for StubTagger {
    async fn embed_comment(&self, _path: &Path, text: &str) -> Result<(), TagError> {
        if self.failing_links.contains(text) {
            Err(TagError::Failed {
                status: "exit status: 1".to_string(),
                output: "Error: not a valid image".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn create_runner(server: &MockServer, dir: &TempDir, failing_links: &[&str]) -> PageTaskRunner {
    create_runner_with_skip_log(server, dir, failing_links, dir.path().join("skipped.log"))
}

fn create_runner_with_skip_log(
    server: &MockServer,
    dir: &TempDir,
    failing_links: &[&str],
    skip_log: PathBuf,
) -> PageTaskRunner {
    let client = build_http_client(Duration::from_secs(5)).expect("Failed to build client");
    let session = Session::new(server.uri(), "sid=test");
    let tagger = StubTagger {
        failing_links: failing_links.iter().map(|s| s.to_string()).collect(),
    };
    let materializer = AssetMaterializer::new(
        build_asset_client().expect("Failed to build asset client"),
        format!("{}/cdn/", server.uri()),
        dir.path().join("exports"),
        Arc::new(tagger),
        SkipLog::new(skip_log),
    );
    PageTaskRunner::new(PageClient::new(client, session, 20), materializer)
}

fn pin_json(pin_id: u64, board: &str, key: &str, mime_type: &str) -> serde_json::Value {
    json!({
        "pin_id": pin_id,
        "board": {"title": board},
        "file": {"bucket": "hbimg", "key": key, "type": mime_type},
        "link": format!("http://example.com/{}", pin_id),
    })
}

async fn mount_page(server: &MockServer, cursor: u64, pins: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/pins/"))
        .and(query_param("max", cursor.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"pins": pins}})))
        .mount(server)
        .await;
}

async fn mount_asset(server: &MockServer, key: &str, status: u16, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/cdn/{}", key)))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(key.as_bytes().to_vec()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn pending(controller: &Controller) -> Vec<u64> {
    controller.pending().map(|t| t.cursor_id).collect()
}

#[tokio::test]
async fn test_full_page_schedules_last_pin() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        501,
        vec![
            pin_json(500, "Travel", "a", "image/jpeg"),
            pin_json(499, "Travel", "b", "image/png"),
        ],
    )
    .await;
    mount_asset(&mock_server, "a", 200, 1).await;
    mount_asset(&mock_server, "b", 200, 1).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(501));

    let outcome = controller.step(&runner).await.expect("queue was empty");

    assert!(matches!(
        outcome,
        TaskOutcome::Advanced {
            next_cursor: 499,
            ..
        }
    ));
    assert_eq!(pending(&controller), vec![499]);

    let exports = dir.path().join("exports").join("Travel");
    assert_eq!(std::fs::read(exports.join("500.jpg")).unwrap(), b"a");
    assert_eq!(std::fs::read(exports.join("499.png")).unwrap(), b"b");
}

#[tokio::test]
async fn test_full_crawl_until_empty_page() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        501,
        vec![
            pin_json(500, "Travel", "a", "image/jpeg"),
            pin_json(499, "Travel", "b", "image/png"),
        ],
    )
    .await;
    mount_page(&mock_server, 499, vec![pin_json(300, "Food", "c", "image/gif")]).await;
    mount_page(&mock_server, 300, vec![]).await;
    mount_asset(&mock_server, "a", 200, 1).await;
    mount_asset(&mock_server, "b", 200, 1).await;
    mount_asset(&mock_server, "c", 200, 1).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(501));

    let stats = controller.run(&runner).await;

    assert!(controller.is_empty());
    assert_eq!(controller.counter(), 3);
    assert_eq!(stats.pages_completed, 2);
    assert_eq!(stats.pins_persisted, 3);
    assert!(stats.reached_end);
    assert!(dir.path().join("exports/Food/300.gif").is_file());
}

#[tokio::test]
async fn test_empty_page_terminates_crawl() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 42, vec![]).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(42));

    let stats = controller.run(&runner).await;

    assert_eq!(stats.tasks_run, 1);
    assert!(stats.reached_end);
    assert!(controller.is_empty());
    assert!(!dir.path().join("exports").exists());
}

#[tokio::test]
async fn test_service_unavailable_requeues_same_cursor() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pins/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(500));

    let outcome = controller.step(&runner).await.expect("queue was empty");

    assert!(matches!(outcome, TaskOutcome::Retry { cursor: 500, .. }));
    assert_eq!(pending(&controller), vec![500]);
    assert_eq!(controller.stats().pins_persisted, 0);
}

#[tokio::test]
async fn test_client_error_is_also_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pins/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);

    let outcome = runner.run_task(CrawlTask::new(77)).await;

    assert_eq!(outcome.follow_up(), Some(CrawlTask::new(77)));
}

#[tokio::test]
async fn test_retries_until_page_recovers() {
    let mock_server = MockServer::start().await;
    // First matching mock wins until it is used up
    Mock::given(method("GET"))
        .and(path("/pins/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(5)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, 500, vec![]).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(500));

    let stats = controller.run(&runner).await;

    assert_eq!(stats.retries, 5);
    assert_eq!(stats.tasks_run, 6);
    assert!(stats.reached_end);
}

#[tokio::test]
async fn test_download_failure_resumes_after_last_saved_pin() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        1000,
        vec![
            pin_json(900, "Art", "a", "image/jpeg"),
            pin_json(899, "Art", "b", "image/jpeg"),
            pin_json(898, "Art", "c", "image/jpeg"),
        ],
    )
    .await;
    mount_asset(&mock_server, "a", 200, 1).await;
    mount_asset(&mock_server, "b", 500, 1).await;
    mount_asset(&mock_server, "c", 200, 0).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(1000));

    let outcome = controller.step(&runner).await.expect("queue was empty");

    match outcome {
        TaskOutcome::Resume {
            cursor, progress, ..
        } => {
            assert_eq!(cursor, 900);
            assert_eq!(progress.persisted, 1);
        }
        other => panic!("expected Resume, got {:?}", other),
    }
    assert_eq!(pending(&controller), vec![900]);
    assert!(dir.path().join("exports/Art/900.jpg").is_file());
    assert!(!dir.path().join("exports/Art/898.jpg").exists());
}

#[tokio::test]
async fn test_first_pin_failure_reuses_page_cursor() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        1000,
        vec![
            pin_json(900, "Art", "a", "image/jpeg"),
            pin_json(899, "Art", "b", "image/jpeg"),
        ],
    )
    .await;
    mount_asset(&mock_server, "a", 404, 1).await;
    mount_asset(&mock_server, "b", 200, 0).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);

    let outcome = runner.run_task(CrawlTask::new(1000)).await;

    assert!(matches!(outcome, TaskOutcome::Resume { cursor: 1000, .. }));
}

#[tokio::test]
async fn test_tag_failure_is_skipped_and_cursor_advances() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        100,
        vec![
            pin_json(90, "Misc", "a", "image/png"),
            pin_json(80, "Misc", "b", "image/png"),
        ],
    )
    .await;
    mount_asset(&mock_server, "a", 200, 1).await;
    mount_asset(&mock_server, "b", 200, 1).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &["http://example.com/90"]);

    let outcome = runner.run_task(CrawlTask::new(100)).await;

    match outcome {
        TaskOutcome::Advanced {
            next_cursor,
            progress,
        } => {
            assert_eq!(next_cursor, 80);
            assert_eq!(progress.persisted, 1);
            assert_eq!(progress.skipped, 1);
        }
        other => panic!("expected Advanced, got {:?}", other),
    }
    assert!(dir.path().join("exports/Misc/90.png").is_file());
    assert_eq!(
        runner.materializer().skip_log().read_ids().await.unwrap(),
        vec![90]
    );
}

#[tokio::test]
async fn test_malformed_page_is_abandoned() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pins/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>please log in</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(500));

    let stats = controller.run(&runner).await;

    assert_eq!(stats.tasks_run, 1);
    assert_eq!(stats.abandoned, 1);
    assert!(!stats.reached_end);
    assert!(controller.is_empty());
}

#[tokio::test]
async fn test_unwritable_export_dir_abandons_task() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, 10, vec![pin_json(9, "Travel", "a", "image/png")]).await;
    mount_asset(&mock_server, "a", 200, 0).await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("exports"), b"not a directory").unwrap();

    let runner = create_runner(&mock_server, &dir, &[]);
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(10));

    let stats = controller.run(&runner).await;

    assert_eq!(stats.abandoned, 1);
    assert!(controller.is_empty());
}

#[tokio::test]
async fn test_unwritable_skip_log_abandons_task() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        10,
        vec![
            pin_json(9, "Travel", "a", "image/png"),
            pin_json(8, "Travel", "b", "image/png"),
        ],
    )
    .await;
    mount_asset(&mock_server, "a", 200, 1).await;
    mount_asset(&mock_server, "b", 200, 0).await;

    let dir = TempDir::new().unwrap();
    let runner = create_runner_with_skip_log(
        &mock_server,
        &dir,
        &["http://example.com/9"],
        dir.path().join("missing").join("skipped.log"),
    );
    let mut controller = Controller::new();
    controller.enqueue(CrawlTask::new(10));

    let stats = controller.run(&runner).await;

    assert_eq!(stats.tasks_run, 1);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.pins_skipped, 0);
    assert!(!stats.reached_end);
    assert!(controller.is_empty());
}

// Uses `true` as the tagger so the configured exiftool path is not needed
#[cfg(unix)]
#[tokio::test]
async fn test_asset_download_is_not_bound_by_page_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdn/big"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"big".to_vec())
                .set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.session.base_url = Some(mock_server.uri());
    config.session.cookie = Some("sid=test".to_string());
    config.crawl.request_timeout_secs = 1;
    config.export.cdn_base = format!("{}/cdn/", mock_server.uri());
    config.export.directory = dir.path().join("exports");
    config.export.skip_log = dir.path().join("skipped.log");
    config.tagger.program = PathBuf::from("true");

    let runner = build_runner(&config).expect("Failed to build runner");
    let pin = PinRecord {
        pin_id: 7,
        board_title: "Travel".to_string(),
        bucket: "hbimg".to_string(),
        key: "big".to_string(),
        mime_type: "image/png".to_string(),
        link: "http://example.com/7".to_string(),
    };

    let outcome = runner.materializer().materialize(&pin).await.unwrap();

    assert!(matches!(outcome, MaterializeOutcome::Persisted { .. }));
    assert_eq!(
        std::fs::read(dir.path().join("exports/Travel/7.png")).unwrap(),
        b"big"
    );
}
