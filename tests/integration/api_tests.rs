//! Control API tests driven through the router with `oneshot`

use crate::common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rx_harvest::api::{create_router, AppState};
use rx_harvest::crawler::{upsert_medicine, JobOutcome};
use rx_harvest::sites::ScrapedMedicine;
use rx_harvest::state::{ResumeCursor, ScrapeStatus};
use rx_harvest::storage::{lock_storage, ProgressRecord, SharedStorage, Storage};
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestApp {
    state: AppState,
    storage: SharedStorage,
    _dir: TempDir,
}

impl TestApp {
    fn new(base_url: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = shared_config(create_test_config(base_url, dir.path(), 1));
        let storage = create_storage(&config);
        let state = AppState::new(config, storage.clone(), CONFIG_HASH);
        Self {
            state,
            storage,
            _dir: dir,
        }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    async fn call(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        send(self.router(), request).await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(self.router(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn offline_app() -> TestApp {
    TestApp::new("http://127.0.0.1:9")
}

#[tokio::test]
async fn test_health_and_root() {
    let app = offline_app();

    let (status, body) = app.call("GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["database"], "connected");

    let (status, body) = app.call("GET", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "rx-harvest");
    assert_eq!(body["sites"][0], "medex");
}

#[tokio::test]
async fn test_status_when_idle() {
    let app = offline_app();

    let (status, body) = app.call("GET", "/scraper/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert_eq!(body["site"], "medex");
    assert_eq!(body["processed_items"], 0);
    assert!(body["status"].is_null());
}

#[tokio::test]
async fn test_stop_without_job_conflicts() {
    let app = offline_app();

    let (status, body) = app.call("POST", "/scraper/stop").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_start_rejects_bad_requests() {
    let app = offline_app();

    let (status, _) = app
        .post_json("/scraper/start", serde_json::json!({ "max_pages": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json("/scraper/start", serde_json::json!({ "site": "nowhere" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    // A malformed body must not fall back to defaults and start a job
    let (status, body) = app
        .post_json("/scraper/start", serde_json::json!({ "max_pages": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let request = Request::builder()
        .method("POST")
        .uri("/scraper/start")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(app.router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.call("GET", "/scraper/status").await;
    assert_eq!(body["running"], false);
}

#[tokio::test]
async fn test_start_with_empty_body_uses_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brands"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[1], None))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_item(&server, 1, brand_page("Brand 1", "5.00", true)).await;

    let app = TestApp::new(&server.uri());

    let (status, body) = app.call("POST", "/scraper/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["site"], "medex");
    assert_eq!(body["resume"], true);

    let outcome = app.state.controller.wait().await.unwrap();
    assert!(matches!(outcome, Some(JobOutcome::Completed { .. })));
}

#[tokio::test]
async fn test_unknown_medicine_is_not_found() {
    let app = offline_app();

    let (status, body) = app.call("GET", "/medicines/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_and_get_medicines() {
    let app = offline_app();

    let id = {
        let mut guard = lock_storage(&app.storage).unwrap();
        for (code, name) in [("MX_1", "Napa Extra"), ("MX_2", "Seclo 20")] {
            let mut item = ScrapedMedicine::new(
                format!("https://medex.com.bd/brands/{}", code),
                name.to_string(),
            );
            item.product_code = Some(code.to_string());
            item.price = Some(2.5);
            upsert_medicine(&mut *guard, &item, None, None).unwrap();
        }
        guard.find_medicine_id("MX_2").unwrap().unwrap()
    };

    let (status, body) = app.call("GET", "/medicines?search=napa").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["medicines"][0]["name"], "Napa Extra");
    assert_eq!(body["limit"], 100);

    let (status, body) = app.call("GET", "/medicines?limit=1&offset=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["medicines"].as_array().unwrap().len(), 1);

    let (status, body) = app.call("GET", &format!("/medicines/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["external_key"], "MX_2");
    assert_eq!(body["currency"], "BDT");
}

#[tokio::test]
async fn test_progress_reports_percentages() {
    let app = offline_app();

    let (status, _) = app.call("GET", "/scraper/progress").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    {
        let mut guard = lock_storage(&app.storage).unwrap();
        let mut record = ProgressRecord::pending("medex");
        record.status = ScrapeStatus::Paused;
        record.current_page = 3;
        record.total_pages = 4;
        record.processed_items = 25;
        record.total_items = 100;
        record.resume_cursor = Some(ResumeCursor {
            page: 3,
            item_offset: 5,
        });
        guard.save_progress(&record).unwrap();
    }

    let (status, body) = app.call("GET", "/scraper/progress?site=medex").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");
    assert_eq!(body["page_percent"], 50.0);
    assert_eq!(body["item_percent"], 25.0);
    assert_eq!(body["resume_cursor"]["page"], 3);
    assert_eq!(body["resume_cursor"]["item_offset"], 5);
}

#[tokio::test]
async fn test_logs_filtering() {
    let app = offline_app();

    {
        let mut guard = lock_storage(&app.storage).unwrap();
        guard
            .append_log("medex", rx_harvest::storage::LogLevel::Info, "started", None)
            .unwrap();
        guard
            .append_log(
                "medex",
                rx_harvest::storage::LogLevel::Error,
                "Item page not found",
                Some("https://medex.com.bd/brands/1/x"),
            )
            .unwrap();
    }

    let (status, body) = app.call("GET", "/scraper/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (status, body) = app.call("GET", "/scraper/logs?level=error").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["logs"][0]["level"], "ERROR");
    assert_eq!(body["logs"][0]["url"], "https://medex.com.bd/brands/1/x");

    let (status, _) = app.call("GET", "/scraper/logs?level=loud").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cleanup_and_stats() {
    let app = offline_app();

    let (status, body) = app.call("DELETE", "/scraper/cleanup?days=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 7);

    let (status, body) = app.call("GET", "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_medicines"], 0);
    assert_eq!(body["error_logs"], 0);
}

#[tokio::test]
async fn test_start_conflict_then_stop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/brands"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[1], None))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_item(&server, 1, brand_page("Brand 1", "5.00", true)).await;

    let app = TestApp::new(&server.uri());

    let (status, body) = app
        .post_json("/scraper/start", serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["site"], "medex");
    assert_eq!(body["resume"], true);

    let (status, body) = app
        .post_json("/scraper/start", serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, body) = app.call("GET", "/scraper/status").await;
    assert_eq!(body["running"], true);

    let (status, _) = app.call("POST", "/scraper/stop").await;
    assert_eq!(status, StatusCode::OK);

    let outcome = app.state.controller.wait().await.unwrap();
    assert!(matches!(outcome, Some(JobOutcome::Paused { .. })));

    let (_, body) = app.call("GET", "/scraper/status").await;
    assert_eq!(body["running"], false);
    assert_eq!(body["status"], "paused");
}
