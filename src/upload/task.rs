//! Per-file upload task state and the handle used to observe or cancel it.

use std::sync::Arc;

use tokio::sync::watch;

/// Progress once the upload descriptor has been issued.
pub const PRESIGNED_PROGRESS: u8 = 10;
/// Upper bound of the transfer phase.
pub const TRANSFERRED_PROGRESS: u8 = 90;
/// Progress while the backend registers the uploaded object.
pub const COMPLETING_PROGRESS: u8 = 95;
pub const DONE_PROGRESS: u8 = 100;

/// Callback receiving every task snapshot change.
pub type Observer = Arc<dyn Fn(&UploadTask) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completing,
    Done,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Done | UploadStatus::Error)
    }

    /// Whether a task may move from `self` to `next`.
    ///
    /// Steps only go forward; `Error` is reachable from any non-terminal state.
    pub fn can_become(&self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        match (*self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Error) => true,
            (from, to) if from == to => true,
            (Pending, Uploading) | (Uploading, Completing) | (Completing, Done) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completing => "completing",
            UploadStatus::Done => "done",
            UploadStatus::Error => "error",
        }
    }
}

/// Snapshot of one file's upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub id: String,
    pub filename: String,
    pub folder: Option<String>,
    pub status: UploadStatus,
    /// Overall progress in percent, never decreasing.
    pub progress: u8,
    pub error: Option<String>,
    /// Id of the created asset once done.
    pub asset_id: Option<String>,
}

impl UploadTask {
    pub fn new(filename: &str, folder: Option<String>) -> Self {
        Self {
            id: new_task_id(),
            filename: filename.to_string(),
            folder,
            status: UploadStatus::Pending,
            progress: 0,
            error: None,
            asset_id: None,
        }
    }

    /// Move to `status` at `progress`. Returns false when nothing changed.
    ///
    /// Invalid transitions are ignored and progress is clamped so it never
    /// goes backwards or past 100.
    fn advance(&mut self, status: UploadStatus, progress: u8) -> bool {
        if !self.status.can_become(status) {
            log::debug!(
                "Ignoring {} -> {} for upload {}",
                self.status.as_str(),
                status.as_str(),
                self.id
            );
            return false;
        }
        let progress = progress.min(DONE_PROGRESS).max(self.progress);
        if status == self.status && progress == self.progress {
            return false;
        }
        self.status = status;
        self.progress = progress;
        true
    }
}

fn new_task_id() -> String {
    let bytes: [u8; 6] = rand::random();
    format!("upload-{}", hex::encode(bytes))
}

/// Map bytes sent into the transfer band of overall progress.
pub fn transfer_progress(sent: u64, total: u64) -> u8 {
    let band = (TRANSFERRED_PROGRESS - PRESIGNED_PROGRESS) as u64;
    if total == 0 {
        return TRANSFERRED_PROGRESS;
    }
    let done = sent.min(total) * band / total;
    PRESIGNED_PROGRESS + done as u8
}

struct Shared {
    state: watch::Sender<UploadTask>,
    cancel: watch::Sender<bool>,
    observer: Option<Observer>,
}

/// Cloneable handle to a running upload.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<Shared>,
}

impl TaskHandle {
    pub fn new(task: UploadTask, observer: Option<Observer>) -> Self {
        let (state, _) = watch::channel(task);
        let (cancel, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state,
                cancel,
                observer,
            }),
        }
    }

    pub fn id(&self) -> String {
        self.shared.state.borrow().id.clone()
    }

    pub fn snapshot(&self) -> UploadTask {
        self.shared.state.borrow().clone()
    }

    /// Receiver that sees every subsequent snapshot.
    pub fn subscribe(&self) -> watch::Receiver<UploadTask> {
        self.shared.state.subscribe()
    }

    /// Request cancellation. Takes effect at the next step boundary or
    /// immediately during the transfer.
    pub fn cancel(&self) {
        if !self.snapshot().status.is_terminal() {
            log::info!("Cancelling upload {}", self.id());
        }
        self.shared.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.cancel.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.shared.cancel.subscribe();
        // The sender lives in `shared`, so the channel cannot close while
        // `self` is borrowed.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    pub(crate) fn advance(&self, status: UploadStatus, progress: u8) {
        self.update(|task| task.advance(status, progress));
    }

    pub(crate) fn finish(&self, asset_id: &str) {
        self.update(|task| {
            if task.advance(UploadStatus::Done, DONE_PROGRESS) {
                task.asset_id = Some(asset_id.to_string());
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn fail(&self, message: &str) {
        self.update(|task| {
            if task.status.is_terminal() {
                return false;
            }
            task.status = UploadStatus::Error;
            task.error = Some(message.to_string());
            true
        });
    }

    fn update<F: FnOnce(&mut UploadTask) -> bool>(&self, modify: F) {
        let changed = self.shared.state.send_if_modified(modify);
        if changed {
            if let Some(ref observer) = self.shared.observer {
                observer(&self.snapshot());
            }
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &*self.shared.state.borrow())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
