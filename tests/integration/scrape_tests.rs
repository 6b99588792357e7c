//! End-to-end scrape runs against mock catalog sites

use crate::common::*;
use rx_harvest::crawler::{run_job, JobOptions, JobOutcome};
use rx_harvest::state::{ResumeCursor, ScrapeStatus};
use rx_harvest::storage::{lock_storage, LogLevel, Storage};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_same_product_twice_updates_one_row() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 1));
    let storage = create_storage(&config);

    let listing =
        r#"<html><body><a href="/brands/13717/3-bion-tablet">3 Bion Tablet</a></body></html>"#
            .to_string();

    for price in ["12.00", "15.00"] {
        server.reset().await;
        mount_listing(&server, 1, listing.clone()).await;
        Mock::given(method("GET"))
            .and(path("/brands/13717/3-bion-tablet"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(brand_page("3 Bion Tablet", price, true)),
            )
            .mount(&server)
            .await;

        let outcome = run_job(
            config.clone(),
            "medex",
            storage.clone(),
            CONFIG_HASH,
            JobOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { processed_items: 1, .. }));
    }

    let guard = lock_storage(&storage).unwrap();
    assert_eq!(guard.count_medicines(None).unwrap(), 1);

    let record = guard.get_medicine_by_key("MX_13717").unwrap().unwrap();
    assert_eq!(record.name, "3 Bion Tablet");
    assert_eq!(record.price, Some(15.0));
    assert_eq!(record.currency, "BDT");
    assert_eq!(
        record.manufacturer.as_deref(),
        Some("Jayson Pharmaceuticals Ltd.")
    );
}

#[tokio::test]
async fn test_stop_then_resume_continues_from_checkpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 10));
    let storage = create_storage(&config);

    let first_run = CancellationToken::new();

    // Requesting listing page 2 signals a stop, so the first run pauses there
    let token = first_run.clone();
    Mock::given(method("GET"))
        .and(path("/brands"))
        .and(query_param("page", "2"))
        .respond_with(OnRequest {
            body: listing_page(&[3, 4], Some(2)),
            effect: move || token.cancel(),
        })
        .mount(&server)
        .await;
    mount_listing(&server, 1, listing_page(&[1, 2], Some(2))).await;

    // Items of page 1 must not be fetched again on resume
    for id in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/brands/{id}/brand-{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(brand_page(&format!("Brand {id}"), "5.00", true)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    for id in [3, 4] {
        mount_item(&server, id, brand_page(&format!("Brand {id}"), "5.00", true)).await;
    }

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        first_run,
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Paused {
            cursor: ResumeCursor {
                page: 2,
                item_offset: 0
            },
            processed_items: 2
        }
    );

    let paused_processed = {
        let guard = lock_storage(&storage).unwrap();
        let progress = guard.load_progress("medex").unwrap().unwrap();
        assert_eq!(progress.status, ScrapeStatus::Paused);
        assert_eq!(progress.total_pages, 2);
        assert_eq!(guard.count_medicines(None).unwrap(), 2);
        progress.processed_items
    };

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            processed_items: 4,
            pages: 1
        }
    );

    let guard = lock_storage(&storage).unwrap();
    let progress = guard.load_progress("medex").unwrap().unwrap();
    assert_eq!(progress.status, ScrapeStatus::Completed);
    assert!(progress.processed_items >= paused_processed);
    assert_eq!(progress.processed_items, 4);
    assert_eq!(progress.total_items, 4);
    assert_eq!(guard.count_medicines(None).unwrap(), 4);
}

#[tokio::test]
async fn test_fresh_run_ignores_paused_checkpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 1));
    let storage = create_storage(&config);

    mount_listing(&server, 1, listing_page(&[1], None)).await;
    mount_item(&server, 1, brand_page("Brand 1", "5.00", true)).await;

    // Pause before anything is fetched
    let stopped = CancellationToken::new();
    stopped.cancel();
    run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        stopped,
    )
    .await
    .unwrap();

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions {
            resume: false,
            max_pages: None,
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            processed_items: 1,
            pages: 1
        }
    );
}

#[tokio::test]
async fn test_missing_optional_section_is_stored_as_null() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 1));
    let storage = create_storage(&config);

    mount_listing(&server, 1, listing_page(&[7], None)).await;
    mount_item(&server, 7, brand_page("Napa", "1.20", false)).await;

    run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let guard = lock_storage(&storage).unwrap();
    let record = guard.get_medicine_by_key("MX_7").unwrap().unwrap();
    assert_eq!(record.name, "Napa");
    assert!(record.indications.is_none());
    assert!(record.side_effects.is_none());
    assert!(record.description.is_none());
    assert_eq!(record.price, Some(1.2));
    assert!(record.html_path.is_some());
}

#[tokio::test]
async fn test_missing_name_logs_one_error_and_skips_item() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 1));
    let storage = create_storage(&config);

    mount_listing(&server, 1, listing_page(&[8, 9], None)).await;
    mount_item(&server, 8, nameless_page()).await;
    mount_item(&server, 9, brand_page("Ace", "0.80", true)).await;

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, JobOutcome::Completed { processed_items: 2, .. }));

    let guard = lock_storage(&storage).unwrap();
    assert_eq!(guard.count_medicines(None).unwrap(), 1);
    assert!(guard.get_medicine_by_key("MX_8").unwrap().is_none());

    let bad_url = item_url(&server, 8);
    assert_eq!(
        guard.count_logs(LogLevel::Error, Some(&bad_url)).unwrap(),
        1
    );
    assert_eq!(guard.count_logs(LogLevel::Error, None).unwrap(), 1);
}

#[tokio::test]
async fn test_failed_listing_page_is_logged_and_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 2));
    let storage = create_storage(&config);

    mount_listing(&server, 2, listing_page(&[5], None)).await;
    Mock::given(method("GET"))
        .and(path("/brands"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_item(&server, 5, brand_page("Seclo", "6.00", true)).await;

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            processed_items: 1,
            pages: 1
        }
    );

    let guard = lock_storage(&storage).unwrap();
    let listing_url = format!("{}/brands", server.uri());
    assert_eq!(
        guard.count_logs(LogLevel::Error, Some(&listing_url)).unwrap(),
        1
    );
    assert!(guard.get_medicine_by_key("MX_5").unwrap().is_some());
}

#[tokio::test]
async fn test_stop_mid_page_resumes_at_item_offset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 1));
    let storage = create_storage(&config);

    mount_listing(&server, 1, listing_page(&[1, 2, 3], None)).await;

    // Fetching item 1 signals a stop; the run pauses before item 2
    let first_run = CancellationToken::new();
    let token = first_run.clone();
    Mock::given(method("GET"))
        .and(path("/brands/1/brand-1"))
        .respond_with(OnRequest {
            body: brand_page("Brand 1", "5.00", true),
            effect: move || token.cancel(),
        })
        .expect(1)
        .mount(&server)
        .await;
    for id in [2, 3] {
        Mock::given(method("GET"))
            .and(path(format!("/brands/{id}/brand-{id}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(brand_page(&format!("Brand {id}"), "5.00", true)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        first_run,
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Paused {
            cursor: ResumeCursor {
                page: 1,
                item_offset: 1
            },
            processed_items: 1
        }
    );

    {
        let guard = lock_storage(&storage).unwrap();
        let progress = guard.load_progress("medex").unwrap().unwrap();
        assert_eq!(progress.status, ScrapeStatus::Paused);
        assert_eq!(progress.total_items, 3);
        assert_eq!(progress.processed_items, 1);
    }

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            processed_items: 3,
            pages: 1
        }
    );

    let guard = lock_storage(&storage).unwrap();
    let progress = guard.load_progress("medex").unwrap().unwrap();
    assert_eq!(progress.status, ScrapeStatus::Completed);
    assert_eq!(progress.processed_items, 3);
    // The re-read listing page is not counted twice
    assert_eq!(progress.total_items, 3);
    assert_eq!(guard.count_medicines(None).unwrap(), 3);
}

#[tokio::test]
async fn test_block_page_is_retried_then_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = shared_config(create_test_config(&server.uri(), dir.path(), 10));
    let storage = create_storage(&config);

    // Served with 200, as Cloudflare and the browser backend do
    Mock::given(method("GET"))
        .and(path("/brands"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Attention Required! | Cloudflare</title></head>
               <body><h1>Sorry, you have been blocked</h1>
               <div class="cf-error-details">Please complete the captcha</div></body></html>"#,
        ))
        .expect(2)
        .mount(&server)
        .await;
    mount_listing(&server, 3, listing_page(&[3], Some(3))).await;
    mount_listing(&server, 1, listing_page(&[1], Some(3))).await;
    mount_item(&server, 1, brand_page("Brand 1", "5.00", true)).await;
    mount_item(&server, 3, brand_page("Brand 3", "5.00", true)).await;

    let outcome = run_job(
        config.clone(),
        "medex",
        storage.clone(),
        CONFIG_HASH,
        JobOptions::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        JobOutcome::Completed {
            processed_items: 2,
            pages: 2
        }
    );

    let guard = lock_storage(&storage).unwrap();
    let blocked_url = format!("{}/brands?page=2", server.uri());
    assert_eq!(
        guard.count_logs(LogLevel::Error, Some(&blocked_url)).unwrap(),
        1
    );
    assert!(guard.get_medicine_by_key("MX_3").unwrap().is_some());

    let progress = guard.load_progress("medex").unwrap().unwrap();
    assert_eq!(progress.status, ScrapeStatus::Completed);
    assert_eq!(progress.total_pages, 3);
}
