//! In-memory transport and fixtures shared by unit tests.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use crate::api::transport::{HttpRequest, HttpResponse, ProgressFn, Transport, TransportError};
use crate::error::TransferError;

// ── Mock replies ──────────────────────────────────────────────────────────────

/// Canned API response, optionally delayed to force interleaving.
pub struct MockReply {
    status: u16,
    body: Vec<u8>,
    delay: Option<Duration>,
    network_error: Option<String>,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: serde_json::to_vec(&body).unwrap(),
            delay: None,
            network_error: None,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            delay: None,
            network_error: None,
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            status: 0,
            body: Vec::new(),
            delay: None,
            network_error: Some(message.to_string()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Scripted behavior of the object-storage PUT.
#[derive(Clone)]
pub enum MockPut {
    /// Report progress at each byte offset, then succeed.
    Succeed { checkpoints: Vec<u64> },
    /// Report progress up to `sent` bytes, then never finish.
    Stall { sent: u64 },
    /// Report progress up to `sent` bytes, then fail.
    Fail { sent: u64, error: TransferError },
}

/// Record of one object PUT.
#[derive(Debug, Clone)]
pub struct PutRecord {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub size: usize,
}

type ApiHandler = Box<dyn Fn(&HttpRequest) -> MockReply + Send + Sync>;

pub struct MockTransport {
    api: ApiHandler,
    put: Mutex<MockPut>,
    requests: Mutex<Vec<HttpRequest>>,
    puts: Mutex<Vec<PutRecord>>,
}

impl MockTransport {
    pub fn new<F>(api: F) -> Self
    where
        F: Fn(&HttpRequest) -> MockReply + Send + Sync + 'static,
    {
        Self {
            api: Box::new(api),
            put: Mutex::new(MockPut::Succeed {
                checkpoints: Vec::new(),
            }),
            requests: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_put(self, put: MockPut) -> Self {
        *self.put.lock().unwrap() = put;
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_path(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .count()
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = (self.api)(&request);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = reply.network_error {
            return Err(TransportError(message));
        }
        Ok(HttpResponse {
            status: reply.status,
            body: reply.body,
        })
    }

    async fn put_object(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        progress: ProgressFn,
    ) -> Result<(), TransferError> {
        let total = body.len() as u64;
        self.puts.lock().unwrap().push(PutRecord {
            url: url.to_string(),
            headers: headers.to_vec(),
            size: body.len(),
        });
        let script = self.put.lock().unwrap().clone();
        match script {
            MockPut::Succeed { checkpoints } => {
                for sent in checkpoints {
                    progress(sent, total);
                    tokio::task::yield_now().await;
                }
                progress(total, total);
                Ok(())
            }
            MockPut::Stall { sent } => {
                progress(sent, total);
                std::future::pending::<()>().await;
                Ok(())
            }
            MockPut::Fail { sent, error } => {
                progress(sent, total);
                Err(error)
            }
        }
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

pub fn user_json(id: u64, role: &str) -> Value {
    json!({
        "id": id,
        "username": format!("user{}", id),
        "email": format!("user{}@example.com", id),
        "first_name": "Test",
        "last_name": "User",
        "role": role,
        "is_active": true,
        "date_joined": "2024-01-01T00:00:00Z"
    })
}

pub fn asset_json(id: &str, filename: &str) -> Value {
    json!({
        "id": id,
        "filename_original": filename,
        "storage_key": format!("uploads/{}/{}", id, filename),
        "cdn_url": format!("https://cdn.example.com/uploads/{}/{}", id, filename),
        "mime_type": "image/png",
        "size_bytes": 1024,
        "width": 64,
        "height": 64,
        "sha256": null,
        "alt_text": "",
        "caption": "",
        "status": "PENDING",
        "folder": null,
        "folder_name": null,
        "tags": [],
        "variants": [],
        "created_by": 1,
        "created_by_username": "user1",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "deleted_at": null,
        "is_deleted": false,
        "is_image": true
    })
}

pub fn asset_page_json(ids: &[&str]) -> Value {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "filename_original": format!("{}.png", id),
                "cdn_url": format!("https://cdn.example.com/{}.png", id),
                "mime_type": "image/png",
                "size_bytes": 1024,
                "width": null,
                "height": null,
                "alt_text": "",
                "status": "APPROVED",
                "folder": null,
                "folder_name": null,
                "tag_count": 0,
                "created_by": 1,
                "created_by_username": "user1",
                "created_at": "2024-01-01T00:00:00Z",
                "deleted_at": null,
                "is_deleted": false
            })
        })
        .collect();
    json!({
        "count": ids.len(),
        "next": null,
        "previous": null,
        "results": results
    })
}

pub fn presign_json(key: &str) -> Value {
    json!({
        "upload_url": format!("https://storage.example.com/{}?X-Amz-Signature=abc", key),
        "storage_key": key,
        "required_headers": {"Content-Type": "image/png", "x-amz-meta-Origin": "Dashboard"},
        "public_cdn_url": format!("https://cdn.example.com/{}", key)
    })
}
