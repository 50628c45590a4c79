//! Integration tests for the upload orchestrator.
//!
//! Uses the in-memory transport with scripted presign/complete replies and a
//! scripted object-storage PUT.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::*;
use crate::api::auth::MemoryTokenStore;
use crate::api::client::ApiClient;
use crate::api::types::AssetFilters;
use crate::cache::{QueryCache, QueryKey};
use crate::error::Error;
use crate::library::{ASSETS_PATH, COMPLETE_PATH, PRESIGN_PATH};
use crate::testing::{asset_json, asset_page_json, presign_json, MockPut, MockReply, MockTransport};

const MB: usize = 1024 * 1024;

/// Backend that presigns any file except `rejected.png` and completes with
/// `complete_status`.
fn backend(complete_status: u16) -> MockTransport {
    MockTransport::new(move |req| {
        let body = req.body.clone().unwrap_or(Value::Null);
        if req.url.ends_with(PRESIGN_PATH) {
            let filename = body["filename"].as_str().unwrap_or_default();
            if filename == "rejected.png" {
                return MockReply::json(400, json!({"detail": "Unsupported file type"}));
            }
            return MockReply::json(200, presign_json(&format!("uploads/{}", filename)));
        }
        if req.url.ends_with(COMPLETE_PATH) {
            if complete_status != 201 {
                return MockReply::json(complete_status, json!({"detail": "Storage object not found"}));
            }
            let filename = body["filename"].as_str().unwrap_or_default();
            return MockReply::json(201, asset_json(&format!("asset-{}", filename), filename));
        }
        if req.url.ends_with(ASSETS_PATH) {
            return MockReply::json(200, asset_page_json(&["a1"]));
        }
        MockReply::json(404, json!({"detail": "Not found."}))
    })
}

fn setup(mock: MockTransport) -> (Uploader<MockTransport>, Arc<Library<MockTransport>>, Arc<Mutex<Vec<UploadTask>>>) {
    let store = Arc::new(MemoryTokenStore::with_tokens("acc", "ref"));
    let client = Arc::new(ApiClient::new(mock, "https://api.example.com", store));
    let library = Arc::new(Library::new(client, QueryCache::default()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let uploader = Uploader::new(library.clone()).with_observer(Arc::new(move |task: &UploadTask| {
        sink.lock().unwrap().push(task.clone());
    }));
    (uploader, library, seen)
}

fn png(name: &str, size: usize) -> UploadSource {
    UploadSource::new(name, "image/png", vec![0u8; size])
}

fn assert_monotonic(tasks: &[UploadTask]) {
    for pair in tasks.windows(2) {
        assert!(
            pair[1].progress >= pair[0].progress,
            "progress went from {} to {}",
            pair[0].progress,
            pair[1].progress
        );
    }
}

#[tokio::test]
async fn test_ten_megabyte_upload_reports_phases() {
    let mock = backend(201).with_put(MockPut::Succeed {
        checkpoints: vec![(5 * MB) as u64],
    });
    let (uploader, library, seen) = setup(mock);

    let asset = uploader
        .upload_file(png("hero.png", 10 * MB), &UploadMetadata::default())
        .await
        .unwrap();
    assert_eq!(asset.id, "asset-hero.png");

    let seen = seen.lock().unwrap().clone();
    assert_monotonic(&seen);

    // Half the bytes sent maps to the middle of the transfer band
    assert!(seen
        .iter()
        .any(|t| t.status == UploadStatus::Uploading && t.progress == 50));
    for t in seen.iter().filter(|t| t.status == UploadStatus::Uploading) {
        assert!(t.progress <= 90);
    }

    let statuses: Vec<UploadStatus> = seen.iter().map(|t| t.status).collect();
    let pos = |s| statuses.iter().position(|x| *x == s).unwrap();
    assert!(pos(UploadStatus::Pending) < pos(UploadStatus::Uploading));
    assert!(pos(UploadStatus::Uploading) < pos(UploadStatus::Completing));
    assert!(pos(UploadStatus::Completing) < pos(UploadStatus::Done));

    let done = seen.last().unwrap();
    assert_eq!(done.status, UploadStatus::Done);
    assert_eq!(done.progress, 100);
    assert_eq!(done.asset_id.as_deref(), Some("asset-hero.png"));

    let puts = library.client().transport().puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].size, 10 * MB);
}

#[tokio::test]
async fn test_required_headers_passed_verbatim() {
    let (uploader, library, _) = setup(backend(201));
    uploader
        .upload_file(png("logo.png", 1024), &UploadMetadata::default())
        .await
        .unwrap();

    let put = &library.client().transport().puts()[0];
    assert_eq!(
        put.url,
        "https://storage.example.com/uploads/logo.png?X-Amz-Signature=abc"
    );
    assert!(put
        .headers
        .contains(&("x-amz-meta-Origin".to_string(), "Dashboard".to_string())));
    assert!(put
        .headers
        .contains(&("Content-Type".to_string(), "image/png".to_string())));
}

#[tokio::test]
async fn test_completion_carries_metadata() {
    let (uploader, library, _) = setup(backend(201));
    let metadata = UploadMetadata {
        folder: Some("f1".into()),
        tag_ids: vec!["t1".into(), "t2".into()],
        status: Some(AssetStatus::Approved),
        alt_text: Some("Team photo".into()),
        caption: None,
    };
    uploader.upload_file(png("team.png", 2048), &metadata).await.unwrap();

    let requests = library.client().transport().requests();
    let presign = requests.iter().find(|r| r.url.ends_with(PRESIGN_PATH)).unwrap();
    let presign_body = presign.body.as_ref().unwrap();
    assert_eq!(presign_body["folder"], "f1");
    assert_eq!(presign_body["size_bytes"], 2048);

    let complete = requests.iter().find(|r| r.url.ends_with(COMPLETE_PATH)).unwrap();
    let body = complete.body.as_ref().unwrap();
    assert_eq!(body["storage_key"], "uploads/team.png");
    assert_eq!(body["content_type"], "image/png");
    assert_eq!(body["size_bytes"], 2048);
    assert_eq!(body["tag_ids"], json!(["t1", "t2"]));
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["alt_text"], "Team photo");
    assert!(body.get("caption").is_none());
}

#[tokio::test]
async fn test_success_invalidates_asset_lists() {
    let (uploader, library, _) = setup(backend(201));
    library.assets(&AssetFilters::default()).await.unwrap();
    assert!(library.cache().await.contains(&QueryKey::asset_list(&[])));

    uploader
        .upload_file(png("new.png", 10), &UploadMetadata::default())
        .await
        .unwrap();
    assert!(!library.cache().await.contains(&QueryKey::asset_list(&[])));
}

#[tokio::test]
async fn test_completion_failure_leaves_error_and_cache() {
    let (uploader, library, seen) = setup(backend(500));
    library.assets(&AssetFilters::default()).await.unwrap();

    let err = uploader
        .upload_file(png("broken.png", 4096), &UploadMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));

    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.status, UploadStatus::Error);
    assert_eq!(last.progress, 95);
    assert!(last.error.unwrap().contains("Storage object not found"));
    assert!(library.cache().await.contains(&QueryKey::asset_list(&[])));
}

#[tokio::test]
async fn test_presign_failure_moves_no_bytes() {
    let (uploader, library, seen) = setup(backend(201));
    let err = uploader
        .upload_file(png("rejected.png", 100), &UploadMetadata::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(library.client().transport().puts().is_empty());
    assert_eq!(library.client().transport().count_path(COMPLETE_PATH), 0);

    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.status, UploadStatus::Error);
    assert!(last.error.unwrap().contains("Unsupported file type"));
}

#[tokio::test]
async fn test_put_failure_is_transfer_error() {
    let mock = backend(201).with_put(MockPut::Fail {
        sent: 512,
        error: TransferError::Status(403),
    });
    let (uploader, library, seen) = setup(mock);

    let err = uploader
        .upload_file(png("expired.png", 1024), &UploadMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transfer(TransferError::Status(403))));
    assert_eq!(library.client().transport().count_path(COMPLETE_PATH), 0);

    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.status, UploadStatus::Error);
    assert_eq!(last.progress, 50);
    assert_eq!(last.error.as_deref(), Some("Upload failed with status 403"));
}

#[tokio::test]
async fn test_cancel_mid_transfer() {
    let mock = backend(201).with_put(MockPut::Stall {
        sent: (2 * MB) as u64,
    });
    let (uploader, library, _) = setup(mock);
    let source = png("stuck.png", 4 * MB);
    let metadata = UploadMetadata::default();
    let handle = uploader.track(&source, &metadata);

    let canceller = async {
        let mut rx = handle.subscribe();
        rx.wait_for(|t| t.progress >= 50).await.unwrap();
        handle.cancel();
    };
    let (result, _) = tokio::join!(uploader.upload(source, &metadata, &handle), canceller);

    assert!(matches!(result, Err(Error::Transfer(TransferError::Cancelled))));
    let task = handle.snapshot();
    assert_eq!(task.status, UploadStatus::Error);
    assert_eq!(task.error.as_deref(), Some("Upload cancelled"));
    assert_eq!(library.client().transport().count_path(COMPLETE_PATH), 0);
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() {
    let (uploader, library, _) = setup(backend(201));
    let source = png("early.png", 10);
    let metadata = UploadMetadata::default();
    let handle = uploader.track(&source, &metadata);
    handle.cancel();

    let err = uploader.upload(source, &metadata, &handle).await.unwrap_err();
    assert!(matches!(err, Error::Transfer(TransferError::Cancelled)));
    assert!(library.client().transport().requests().is_empty());
    assert_eq!(handle.snapshot().error.as_deref(), Some("Upload cancelled"));
}

#[tokio::test]
async fn test_upload_many_settles_every_task() {
    let (uploader, library, _) = setup(backend(201));
    let sources = vec![png("one.png", 100), png("rejected.png", 100), png("three.png", 100)];

    let results = uploader.upload_many(sources, &UploadMetadata::default()).await;
    assert_eq!(results.len(), 3);

    let (first, first_result) = &results[0];
    assert_eq!(first.filename, "one.png");
    assert_eq!(first.status, UploadStatus::Done);
    assert!(first_result.is_ok());

    assert_eq!(results[1].0.status, UploadStatus::Error);
    assert!(results[1].1.is_err());

    assert_eq!(results[2].0.status, UploadStatus::Done);
    assert_ne!(results[0].0.id, results[2].0.id);

    assert_eq!(library.client().transport().puts().len(), 2);
    assert_eq!(library.client().transport().count_path(COMPLETE_PATH), 2);
}
