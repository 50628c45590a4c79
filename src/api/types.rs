//! Request and response types for the asset-management backend API.
//!
//! The backend speaks snake_case JSON, which is serde's default for Rust
//! field names, so most structs need no rename attribute.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Auth ──────────────────────────────────────────────────────────────────────

/// User role, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Viewer,
    Uploader,
    Editor,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Owner,
        Role::Admin,
        Role::Editor,
        Role::Uploader,
        Role::Viewer,
    ];
}

/// Response from GET /auth/users/me/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub date_joined: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Login request body sent to POST /auth/jwt/create/.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Token pair from POST /auth/jwt/create/.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Refresh request body sent to POST /auth/jwt/refresh/.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Refresh response. The refresh token is only present when the backend rotates it.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Account creation body for POST /auth/users/.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub re_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

// ── Assets ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetStatus {
    Pending,
    Approved,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "PENDING",
            AssetStatus::Approved => "APPROVED",
        }
    }
}

/// Rendition generated by the backend (original, thumbnails, webp sizes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetVariant {
    pub id: String,
    pub kind: String,
    pub storage_key: String,
    pub cdn_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub full_path: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Full asset record from GET /api/assets/{id}/ and the upload completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub filename_original: String,
    pub storage_key: String,
    pub cdn_url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub caption: String,
    pub status: AssetStatus,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub variants: Vec<AssetVariant>,
    pub created_by: u64,
    #[serde(default)]
    pub created_by_username: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_image: bool,
}

/// Compact asset row returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetListItem {
    pub id: String,
    pub filename_original: String,
    pub cdn_url: String,
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub alt_text: String,
    pub status: AssetStatus,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub tag_count: u32,
    pub created_by: u64,
    #[serde(default)]
    pub created_by_username: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// PATCH body for an asset. `folder: Some(None)` moves the asset to the root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
}

/// Query filters for GET /api/assets/.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetFilters {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub folder: Option<String>,
    pub kind: Option<String>,
    pub status: Option<AssetStatus>,
    pub deleted: Option<bool>,
}

impl AssetFilters {
    /// Query pairs in a fixed order, so equal filters give equal cache keys.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        push(&mut q, "page", self.page.map(|v| v.to_string()));
        push(&mut q, "page_size", self.page_size.map(|v| v.to_string()));
        push(&mut q, "search", self.search.clone());
        push(&mut q, "tag", self.tag.clone());
        push(&mut q, "folder", self.folder.clone());
        push(&mut q, "type", self.kind.clone());
        push(&mut q, "status", self.status.map(|s| s.as_str().to_string()));
        push(&mut q, "deleted", self.deleted.map(|v| v.to_string()));
        q
    }
}

// ── Folders & tags ────────────────────────────────────────────────────────────

/// POST/PATCH body for folders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagDraft {
    pub name: String,
}

// ── Audit ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    #[serde(default)]
    pub actor: Option<Value>,
    #[serde(default)]
    pub actor_username: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: String,
}

/// Query filters for GET /api/audit/.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilters {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub action: Option<String>,
    pub target_type: Option<String>,
    pub actor: Option<String>,
}

impl AuditFilters {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        push(&mut q, "page", self.page.map(|v| v.to_string()));
        push(&mut q, "page_size", self.page_size.map(|v| v.to_string()));
        push(&mut q, "action", self.action.clone());
        push(&mut q, "target_type", self.target_type.clone());
        push(&mut q, "actor", self.actor.clone());
        q
    }
}

fn push(q: &mut Vec<(String, String)>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        q.push((key.to_string(), v));
    }
}

// ── Pagination ────────────────────────────────────────────────────────────────

/// Paginated list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Folder and tag lists come back either paginated or as a bare array
/// depending on backend configuration.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Page(Page<T>),
    Items(Vec<T>),
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Page(page) => page.results,
            ListResponse::Items(items) => items,
        }
    }
}

// ── Uploads ───────────────────────────────────────────────────────────────────

/// Body for POST /api/uploads/presign/.
#[derive(Debug, Clone, Serialize)]
pub struct PresignRequest {
    pub filename: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// One-time upload descriptor from POST /api/uploads/presign/.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresignResponse {
    pub upload_url: String,
    pub storage_key: String,
    #[serde(default)]
    pub required_headers: HashMap<String, String>,
    #[serde(default)]
    pub public_cdn_url: Option<String>,
}

/// Body for POST /api/uploads/complete/.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteUploadRequest {
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}
