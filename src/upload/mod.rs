//! Direct-to-storage uploads: presign, PUT, complete.
//!
//! Each file is an independent task. The object bytes go straight to the
//! presigned URL through the transport, never through the API client, so a
//! large PUT does not hold up API traffic or the refresh gate.

pub mod source;
pub mod task;
#[cfg(test)]
mod tests;

pub use source::{guess_content_type, UploadSource};
pub use task::{Observer, TaskHandle, UploadStatus, UploadTask};

use std::sync::Arc;

use crate::api::transport::{ProgressFn, Transport};
use crate::api::types::{Asset, AssetStatus, CompleteUploadRequest, PresignRequest};
use crate::error::{Result, TransferError};
use crate::library::Library;
use task::{transfer_progress, COMPLETING_PROGRESS, PRESIGNED_PROGRESS};

/// Metadata attached when the upload is registered.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub folder: Option<String>,
    pub tag_ids: Vec<String>,
    pub status: Option<AssetStatus>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
}

/// Runs upload tasks against a `Library`.
pub struct Uploader<T> {
    library: Arc<Library<T>>,
    observer: Option<Observer>,
}

impl<T: Transport> Uploader<T> {
    pub fn new(library: Arc<Library<T>>) -> Self {
        Self {
            library,
            observer: None,
        }
    }

    /// Report every task snapshot change to `observer`.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Create a pending task for `source`. Nothing is sent until `upload`.
    pub fn track(&self, source: &UploadSource, metadata: &UploadMetadata) -> TaskHandle {
        let task = UploadTask::new(&source.filename, metadata.folder.clone());
        let handle = TaskHandle::new(task, self.observer.clone());
        if let Some(ref observer) = self.observer {
            observer(&handle.snapshot());
        }
        handle
    }

    /// Upload one file under a fresh task.
    pub async fn upload_file(&self, source: UploadSource, metadata: &UploadMetadata) -> Result<Asset> {
        let handle = self.track(&source, metadata);
        self.upload(source, metadata, &handle).await
    }

    /// Upload every file concurrently and wait for all of them to settle.
    ///
    /// Results are in input order; one failure does not affect the others.
    pub async fn upload_many(
        &self,
        sources: Vec<UploadSource>,
        metadata: &UploadMetadata,
    ) -> Vec<(UploadTask, Result<Asset>)> {
        let handles: Vec<TaskHandle> = sources.iter().map(|s| self.track(s, metadata)).collect();
        let runs = sources
            .into_iter()
            .zip(handles.iter())
            .map(|(source, handle)| self.upload(source, metadata, handle));
        let results = futures::future::join_all(runs).await;

        let settled: Vec<_> = handles
            .iter()
            .map(TaskHandle::snapshot)
            .zip(results)
            .collect();
        let failed = settled.iter().filter(|(_, r)| r.is_err()).count();
        log::info!(
            "Batch upload finished: {} succeeded, {} failed",
            settled.len() - failed,
            failed
        );
        settled
    }

    /// Drive `handle` through presign, transfer and completion.
    ///
    /// The task ends in `Done` with the created asset, or in `Error` with the
    /// failure message; a cancelled task always reads "Upload cancelled".
    pub async fn upload(&self, source: UploadSource, metadata: &UploadMetadata, handle: &TaskHandle) -> Result<Asset> {
        let result = self.run(source, metadata, handle).await;
        match result {
            Ok(ref asset) => {
                handle.finish(&asset.id);
                log::info!("Uploaded {} as asset {}", asset.filename_original, asset.id);
            }
            Err(ref e) => {
                handle.fail(&e.to_string());
                log::warn!("Upload {} failed: {}", handle.id(), e);
            }
        }
        result
    }

    async fn run(&self, source: UploadSource, metadata: &UploadMetadata, handle: &TaskHandle) -> Result<Asset> {
        let size = source.size();

        // Step 1: presign
        check_cancelled(handle)?;
        handle.advance(UploadStatus::Uploading, 0);
        let presign = self
            .library
            .presign(&PresignRequest {
                filename: source.filename.clone(),
                content_type: source.content_type.clone(),
                folder: metadata.folder.clone(),
                size_bytes: Some(size),
            })
            .await?;
        handle.advance(UploadStatus::Uploading, PRESIGNED_PROGRESS);
        log::debug!("Presigned {} -> {}", source.filename, presign.storage_key);

        // Step 2: transfer
        check_cancelled(handle)?;
        let mut headers: Vec<(String, String)> = presign.required_headers.into_iter().collect();
        headers.sort();
        let progress: ProgressFn = {
            let handle = handle.clone();
            Arc::new(move |sent, total| {
                handle.advance(UploadStatus::Uploading, transfer_progress(sent, total));
            })
        };
        let transport = self.library.client().transport();
        tokio::select! {
            biased;
            _ = handle.cancelled() => return Err(TransferError::Cancelled.into()),
            sent = transport.put_object(&presign.upload_url, &headers, source.bytes, progress) => sent?,
        }

        // Step 3: complete
        check_cancelled(handle)?;
        handle.advance(UploadStatus::Completing, COMPLETING_PROGRESS);
        let request = CompleteUploadRequest {
            storage_key: presign.storage_key,
            filename: source.filename,
            content_type: source.content_type,
            size_bytes: size,
            folder: metadata.folder.clone(),
            tag_ids: (!metadata.tag_ids.is_empty()).then(|| metadata.tag_ids.clone()),
            status: metadata.status,
            alt_text: metadata.alt_text.clone(),
            caption: metadata.caption.clone(),
        };
        self.library.complete_upload(&request).await
    }
}

fn check_cancelled(handle: &TaskHandle) -> Result<(), TransferError> {
    if handle.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    Ok(())
}
