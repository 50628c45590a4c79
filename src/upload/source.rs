//! File contents queued for upload.

use std::path::Path;

use crate::error::{Result, ValidationError};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes plus the name and type the backend records for them.
#[derive(Clone)]
pub struct UploadSource {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadSource {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing the content type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ValidationError::new("path", format!("Not a file: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let content_type = guess_content_type(&filename).to_string();
        log::debug!("Loaded {} ({} bytes, {})", filename, bytes.len(), content_type);
        Ok(Self {
            filename,
            content_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSource")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// MIME type for a filename's extension.
pub fn guess_content_type(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return FALLBACK_CONTENT_TYPE,
    };
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => FALLBACK_CONTENT_TYPE,
    }
}
