//! Tokio facade tests against the in-memory store.

use std::time::Duration;

use chrono::NaiveDate;

use indigo_upload::config::ImageSettings;
use indigo_upload::remote::MemoryConnector;
use indigo_upload::{AsyncUploader, DeleteOutcome, ErrorKind, Uploader};

fn async_uploader(connector: &MemoryConnector) -> AsyncUploader {
    let uploader = Uploader::new(connector.clone(), "/data", ImageSettings::default())
        .with_date_source(|| NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    AsyncUploader::new(uploader).with_deadline(Duration::from_secs(10))
}

#[tokio::test]
async fn test_store_fetch_delete() {
    let connector = MemoryConnector::new();
    let uploader = async_uploader(&connector);

    let stored = uploader
        .store_bytes(b"quarterly numbers".to_vec(), "reports", "q2.csv")
        .await
        .unwrap();
    assert_eq!(stored.relative_path, "reports/20240601/q2.csv");

    let fetched = uploader.fetch(&stored.relative_path).await.unwrap();
    assert_eq!(fetched, Some(b"quarterly numbers".to_vec()));

    assert_eq!(
        uploader.delete(&stored.relative_path).await.unwrap(),
        DeleteOutcome::Deleted
    );
    assert_eq!(
        uploader.delete(&stored.relative_path).await.unwrap(),
        DeleteOutcome::NotFound
    );
    assert_eq!(connector.open_sessions(), 0);
}

#[tokio::test]
async fn test_concurrent_uploads_use_separate_sessions() {
    let connector = MemoryConnector::new();
    let uploader = async_uploader(&connector);

    let mut handles = Vec::new();
    for i in 0..8 {
        let uploader = uploader.clone();
        handles.push(tokio::spawn(async move {
            uploader
                .store_bytes(format!("body {}", i).into_bytes(), "batch", &format!("f{}.txt", i))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(connector.sessions_opened(), 8);
    assert_eq!(connector.open_sessions(), 0);
    assert_eq!(connector.file_paths().len(), 8);
}

#[tokio::test]
async fn test_errors_keep_their_kind() {
    let connector = MemoryConnector::new();
    connector.refuse_connections(true);
    let uploader = async_uploader(&connector);

    let err = uploader.fetch("reports/20240601/q2.csv").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);

    let err = uploader.store_bytes(Vec::new(), "reports", "empty.csv").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
