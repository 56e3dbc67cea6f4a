//! Orchestrator and download manager behaviour.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use futures::StreamExt;
use tokio::sync::watch;

use catalog::{Download, Purpose};
use scene_common::SceneError;
use scene_downloader::{
    DownloadConfig, DownloadManager, DownloadOrchestrator, ItemOutcome, OutcomeCounts, Progress,
    ProgressReporter,
};

fn download(id: &str, day: u32) -> Download {
    let date = NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
    let mut urls = BTreeMap::new();
    urls.insert(Purpose::Mask, format!("http://wcs.invalid/{}/mask", id));
    urls.insert(Purpose::Full, format!("http://wcs.invalid/{}/full", id));
    Download {
        id: id.to_string(),
        date,
        collection: "ga_ls8c_ard_3".to_string(),
        urls,
        assets: vec!["nbart_red".to_string(), "oa_fmask".to_string()],
        file_name: format!("{}.tif", date.format("%Y-%m-%d")),
    }
}

fn downloads(n: u32) -> Vec<Download> {
    (1..=n).map(|i| download(&format!("scene-{}", i), i)).collect()
}

// ============================================================================
// Orchestrator
// ============================================================================

#[tokio::test]
async fn test_one_failure_does_not_abort_batch() {
    let items = downloads(6);
    let (_tx, rx) = watch::channel(false);
    let orchestrator = DownloadOrchestrator::new(3, 5, rx);

    let outcomes = orchestrator
        .fetch_all(&items, Purpose::Mask, |item, url| async move {
            if item.id == "scene-4" {
                Err(SceneError::download(&item.id, "HTTP error: 503 Service Unavailable"))
            } else {
                Ok(url)
            }
        })
        .await;

    assert_eq!(outcomes.len(), 6);
    let counts = OutcomeCounts::tally(&outcomes);
    assert_eq!(counts.succeeded, 5);
    assert_eq!(counts.failed, 1);

    // input order is preserved
    let ids: Vec<&str> = outcomes.iter().map(|o| o.id()).collect();
    let expected: Vec<&str> = items.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, expected);

    assert!(outcomes[3].is_failed());
    assert_eq!(
        outcomes[0].value().map(String::as_str),
        Some("http://wcs.invalid/scene-1/mask")
    );
}

#[tokio::test]
async fn test_out_of_order_completion_keeps_input_order() {
    let items = downloads(4);
    let (_tx, rx) = watch::channel(false);
    let orchestrator = DownloadOrchestrator::new(4, 1, rx);

    let outcomes = orchestrator
        .fetch_all(&items, Purpose::Full, |item, _url| async move {
            // later items finish first
            let day = u64::from(item.date.day());
            tokio::time::sleep(Duration::from_millis(40 - day * 10)).await;
            Ok(item.id)
        })
        .await;

    let values: Vec<&str> = outcomes.iter().filter_map(|o| o.value()).map(String::as_str).collect();
    assert_eq!(values, vec!["scene-1", "scene-2", "scene-3", "scene-4"]);
}

#[tokio::test]
async fn test_missing_url_is_item_failure() {
    let mut item = download("scene-1", 1);
    item.urls.remove(&Purpose::Full);
    let (_tx, rx) = watch::channel(false);
    let orchestrator = DownloadOrchestrator::new(1, 5, rx);

    let outcomes = orchestrator
        .fetch_all(&[item], Purpose::Full, |_item, url| async move { Ok(url) })
        .await;

    match &outcomes[0] {
        ItemOutcome::Failed { error, .. } => assert!(matches!(error, SceneError::Download { .. })),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown_cancels_pending_items() {
    let items = downloads(3);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let orchestrator = DownloadOrchestrator::new(2, 5, rx);
    assert!(orchestrator.is_cancelled());

    let calls = AtomicUsize::new(0);
    let outcomes = orchestrator
        .fetch_all(&items, Purpose::Mask, |_item, url| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(url) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(OutcomeCounts::tally(&outcomes).cancelled, 3);
}

#[tokio::test]
async fn test_progress_reported_through_phase() {
    let items = downloads(7);
    let (_tx, rx) = watch::channel(false);
    let orchestrator = DownloadOrchestrator::new(3, 3, rx);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let reporter = Arc::new(ProgressReporter::new(
        "mask",
        items.len(),
        3,
        Arc::new(move |p: Progress| sink.lock().unwrap().push(p)),
    ));

    orchestrator
        .fetch_all_with(&items, Purpose::Mask, reporter, |_item, url| async move { Ok(url) })
        .await;

    let seen = seen.lock().unwrap();
    let counts: Vec<usize> = seen.iter().map(|p| p.completed).collect();
    assert_eq!(counts, vec![3, 6, 7]);
    assert!(seen.iter().all(|p| p.total == 7 && p.phase == "mask"));
}

// ============================================================================
// Download manager
// ============================================================================

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::SERVICE_UNAVAILABLE, Vec::new())
    } else {
        (StatusCode::OK, b"coverage bytes".to_vec())
    }
}

/// Five 1000-byte chunks with a pause before each.
async fn slow() -> Body {
    let chunks = futures::stream::iter(0..5).then(|_| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, std::io::Error>(Bytes::from(vec![b'A'; 1000]))
    });
    Body::from_stream(chunks)
}

async fn start_server() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/ok", get(|| async { b"coverage bytes".to_vec() }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/flaky", get(flaky))
        .route("/slow", get(slow))
        .route("/fast", get(|| async { b"BBBB".to_vec() }))
        .with_state(hits.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base, hits)
}

fn manager(max_retries: u32) -> DownloadManager {
    DownloadManager::new(DownloadConfig {
        max_retries,
        initial_retry_delay: Duration::from_millis(10),
        max_retry_delay: Duration::from_millis(20),
        request_timeout: Duration::from_secs(10),
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_returns_body() {
    let (base, _) = start_server().await;

    let bytes = manager(0)
        .fetch("scene-1", Purpose::Mask, &format!("{}/ok", base))
        .await
        .unwrap();

    assert_eq!(&bytes[..], b"coverage bytes");
}

#[tokio::test]
async fn test_concurrent_fetches_with_similar_ids_stay_separate() {
    let (base, _) = start_server().await;
    let manager = manager(0);

    // ids differing only in punctuation
    let slow_url = format!("{}/slow", base);
    let fast_url = format!("{}/fast", base);
    let (slow, fast) = tokio::join!(
        manager.fetch("scene/1", Purpose::Full, &slow_url),
        manager.fetch("scene:1", Purpose::Full, &fast_url),
    );

    let slow = slow.unwrap();
    assert_eq!(slow.len(), 5000);
    assert!(slow.iter().all(|b| *b == b'A'));
    assert_eq!(&fast.unwrap()[..], b"BBBB");
}

#[tokio::test]
async fn test_http_error_is_download_error() {
    let (base, _) = start_server().await;

    let err = manager(0)
        .fetch("scene-1", Purpose::Full, &format!("{}/missing", base))
        .await
        .unwrap_err();

    match err {
        SceneError::Download { id, message } => {
            assert_eq!(id, "scene-1");
            assert!(message.contains("404"));
        }
        other => panic!("expected download error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_retry_by_default() {
    let (base, hits) = start_server().await;

    let result = manager(0)
        .fetch("scene-1", Purpose::Mask, &format!("{}/flaky", base))
        .await;

    assert!(result.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_recovers_from_transient_error() {
    let (base, hits) = start_server().await;

    let bytes = manager(2)
        .fetch("scene-1", Purpose::Mask, &format!("{}/flaky", base))
        .await
        .unwrap();

    assert_eq!(&bytes[..], b"coverage bytes");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_http_error_fails_one_item_in_batch() {
    let (base, _) = start_server().await;
    let manager = manager(0);

    let mut items = downloads(5);
    for item in &mut items {
        item.urls.insert(Purpose::Mask, format!("{}/ok", base));
    }
    items[2].urls.insert(Purpose::Mask, format!("{}/missing", base));

    let (_tx, rx) = watch::channel(false);
    let orchestrator = DownloadOrchestrator::new(3, 5, rx);
    let manager = &manager;
    let outcomes = orchestrator
        .fetch_all(&items, Purpose::Mask, |item, url| async move {
            manager.fetch(&item.id, Purpose::Mask, &url).await
        })
        .await;

    let counts = OutcomeCounts::tally(&outcomes);
    assert_eq!(counts.succeeded, 4);
    assert_eq!(counts.failed, 1);

    let ids: Vec<&str> = outcomes.iter().map(|o| o.id()).collect();
    assert_eq!(ids, vec!["scene-1", "scene-2", "scene-3", "scene-4", "scene-5"]);

    match &outcomes[2] {
        ItemOutcome::Failed { error: SceneError::Download { id, message }, .. } => {
            assert_eq!(id, "scene-3");
            assert!(message.contains("404"));
        }
        other => panic!("expected download failure, got {:?}", other),
    }
    assert_eq!(
        outcomes[0].value().map(|b| &b[..]),
        Some(&b"coverage bytes"[..])
    );
}
