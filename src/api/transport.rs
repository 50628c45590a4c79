//! Wire transport underneath the API client and the upload orchestrator.
//!
//! `Transport` is the seam between request logic and the network. The
//! production implementation is reqwest; tests plug in an in-memory mock.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::error::TransferError;

/// Chunk size used when streaming an object to storage.
pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Callback receiving `(bytes_sent, total_bytes)` during an object PUT.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One JSON API call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }
}

/// Raw response: status and body bytes, decoded by the caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request never produced a response (DNS, connect, TLS, timeout).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Network seam used by `ApiClient` and `Uploader`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Perform one JSON API request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// PUT raw bytes to a presigned storage URL with the given headers attached verbatim.
    ///
    /// `progress` is called with the cumulative number of bytes handed to the
    /// connection; values never decrease.
    async fn put_object(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        progress: ProgressFn,
    ) -> Result<(), TransferError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        log::debug!("{} {}", request.method, request.url);

        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn put_object(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        progress: ProgressFn,
    ) -> Result<(), TransferError> {
        let body = Bytes::from(body);
        let total = body.len() as u64;

        let mut builder = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(progress_chunks(body, progress)));

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransferError::Network(format!("Invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransferError::Network(format!("Invalid header value: {}", e)))?;
            builder = builder.header(name, value);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransferError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            log::warn!("Object PUT rejected ({}): {}", status, body);
            return Err(TransferError::Status(status));
        }

        Ok(())
    }
}

/// Split `body` into `UPLOAD_CHUNK_SIZE` slices of the same buffer, reporting
/// cumulative bytes as the connection pulls each one.
fn progress_chunks(
    body: Bytes,
    progress: ProgressFn,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = body.len() as u64;
    let starts = (0..body.len()).step_by(UPLOAD_CHUNK_SIZE);
    futures::stream::iter(starts.map(move |start| {
        let end = (start + UPLOAD_CHUNK_SIZE).min(body.len());
        progress(end as u64, total);
        Ok(body.slice(start..end))
    }))
}
