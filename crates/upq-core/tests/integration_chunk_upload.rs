//! Integration test: local chunk-session server, curl transport, SQLite store.
//!
//! Runs the upload manager end to end and asserts the server assembled the
//! exact bytes, then checks persistence and session lookup over real HTTP.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use upq_core::registry::FileHandle;
use upq_core::retry::RetryPolicy;
use upq_core::scheduler::{ManagerOptions, UploadManager};
use upq_core::store::{QueueStore, SqliteStore};
use upq_core::task::TaskStatus;
use upq_core::transport::{ChunkTransport, CurlTransport};
use upq_core::view::NoopView;

fn transport(server: &common::chunk_server::ChunkServer) -> CurlTransport {
    CurlTransport::new(&server.base_url, Duration::from_secs(5), Duration::from_secs(10))
}

fn options(chunk_size: u64) -> ManagerOptions {
    ManagerOptions {
        max_active_uploads: 1,
        chunk_size,
        render_interval: Duration::ZERO,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        reconcile: true,
    }
}

#[tokio::test]
async fn file_on_disk_is_uploaded_and_assembled() {
    let server = common::chunk_server::start();
    let dir = tempdir().unwrap();
    let body: Vec<u8> = (0u8..251).cycle().take(40 * 1024 + 123).collect();
    let path = dir.path().join("photo.jpg");
    std::fs::write(&path, &body).unwrap();

    let store = SqliteStore::open_at(dir.path().join("queue.db")).await.unwrap();
    let m = UploadManager::create(options(8 * 1024), transport(&server), store, Arc::new(NoopView))
        .await
        .unwrap();
    let file = FileHandle::open(&path).await.unwrap();
    assert_eq!(file.media_type, "image/jpeg");
    m.enqueue(vec![file]).await.unwrap();
    m.wait_idle().await.unwrap();

    let tasks = m.snapshot().await;
    assert_eq!(tasks[0].status, TaskStatus::Done, "last_error: {:?}", tasks[0].last_error);
    assert_eq!(tasks[0].progress, 100);
    assert_eq!(server.appends(), (0..6).collect::<Vec<_>>());
    assert_eq!(server.finished("photo.jpg").expect("finished upload"), body);
    m.dispose().await.unwrap();

    let reopened = SqliteStore::open_at(dir.path().join("queue.db")).await.unwrap();
    let saved = reopened.load().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].status, TaskStatus::Done);
    assert_eq!(saved[0].session_id.as_deref(), Some("sess1"));
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let server = common::chunk_server::start();
    server.fail_chunk(1, 1);
    server.fail_chunk(3, u32::MAX);
    let dir = tempdir().unwrap();
    let store = SqliteStore::open_at(dir.path().join("queue.db")).await.unwrap();
    let m = UploadManager::create(options(1024), transport(&server), store, Arc::new(NoopView))
        .await
        .unwrap();

    m.enqueue(vec![FileHandle::from_bytes("notes.txt", vec![b'x'; 5 * 1024])])
        .await
        .unwrap();
    m.wait_idle().await.unwrap();

    let task = &m.snapshot().await[0];
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retries, 3);
    assert_eq!(task.progress, 60);
    let err = task.last_error.as_deref().unwrap();
    assert!(err.contains("HTTP 500"), "{}", err);
    assert!(err.contains("disk full"), "{}", err);
    assert_eq!(server.appends(), vec![0, 1, 1, 2, 3, 3, 3]);
    assert!(server.finished("notes.txt").is_none());
    m.dispose().await.unwrap();
}

#[tokio::test]
async fn status_and_cancel_over_http() {
    let server = common::chunk_server::start();
    let t = transport(&server);

    let start = t.start_session("a.bin", 3000, "application/octet-stream").await.unwrap();
    assert_eq!(start.recommended_chunk_size, Some(1_048_576));
    let pct = t
        .append_chunk(&start.session_id, 0, vec![0u8; 1000], 3)
        .await
        .unwrap();
    assert_eq!(pct, 33);

    let status = t.query_status(&start.session_id).await.unwrap();
    assert!(status.exists);
    assert_eq!((status.received, status.total), (1000, 3000));
    assert_eq!(status.progress(), 33);

    let conflict = t
        .append_chunk(&start.session_id, 2, vec![0u8; 1000], 3)
        .await
        .unwrap_err();
    assert!(conflict.to_string().contains("409"), "{}", conflict);

    t.cancel_session(&start.session_id).await;
    assert_eq!(server.cancelled(), vec![start.session_id.clone()]);
    let gone = t.query_status(&start.session_id).await.unwrap();
    assert!(!gone.exists);
    assert_eq!(server.sessions_started(), 1);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let t = CurlTransport::new(
        "http://127.0.0.1:9/upload/upload_chunk",
        Duration::from_secs(2),
        Duration::from_secs(2),
    );
    let err = t.start_session("a", 1, "text/plain").await.unwrap_err();
    assert!(matches!(
        err.kind,
        upq_core::transport::TransportErrorKind::Network(_)
    ));
    // Best effort: never panics or errors.
    t.cancel_session("whatever").await;
}
