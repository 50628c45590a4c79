//! Typed queries and mutations over the API with a read-through cache.
//!
//! Queries consult the cache first; mutations go straight to the server and,
//! only when they succeed, invalidate the entries their change could affect.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::api::client::{segment, ApiClient};
use crate::api::transport::Transport;
use crate::api::types::{
    Asset, AssetFilters, AssetListItem, AssetUpdate, AuditFilters, AuditLog, CompleteUploadRequest,
    Credentials, Folder, FolderDraft, ListResponse, Page, PresignRequest, PresignResponse, Tag,
    TagDraft, TokenPair, User,
};
use crate::cache::{QueryCache, QueryKey, QueryScope};
use crate::error::{Result, ValidationError};
use crate::permissions::{self, PermissionSet};

pub const ASSETS_PATH: &str = "/api/assets/";
pub const FOLDERS_PATH: &str = "/api/folders/";
pub const TAGS_PATH: &str = "/api/tags/";
pub const AUDIT_PATH: &str = "/api/audit/";
pub const PRESIGN_PATH: &str = "/api/uploads/presign/";
pub const COMPLETE_PATH: &str = "/api/uploads/complete/";

/// Query/mutation layer shared by the CLI and the upload orchestrator.
pub struct Library<T> {
    client: Arc<ApiClient<T>>,
    cache: RwLock<QueryCache>,
}

impl<T: Transport> Library<T> {
    pub fn new(client: Arc<ApiClient<T>>, cache: QueryCache) -> Self {
        Self {
            client,
            cache: RwLock::new(cache),
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    /// Read access to the cache, mostly for inspection in tests and tooling.
    pub async fn cache(&self) -> tokio::sync::RwLockReadGuard<'_, QueryCache> {
        self.cache.read().await
    }

    async fn cached<R, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<R>
    where
        R: DeserializeOwned + Serialize,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<R>>,
    {
        if let Some(value) = self.cache.read().await.get(&key) {
            match serde_json::from_value(value.clone()) {
                Ok(hit) => return Ok(hit),
                Err(e) => log::warn!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        let fresh = fetch().await?;
        self.cache
            .write()
            .await
            .set(key, serde_json::to_value(&fresh)?);
        Ok(fresh)
    }

    async fn invalidate(&self, scopes: &[QueryScope], keys: &[QueryKey]) {
        let mut cache = self.cache.write().await;
        for scope in scopes {
            cache.invalidate_scope(*scope);
        }
        for key in keys {
            cache.invalidate(key);
        }
    }

    // ── Session ───────────────────────────────────────────────────────────

    pub async fn login(&self, credentials: &Credentials) -> Result<(TokenPair, User)> {
        self.cache.write().await.clear();
        let (tokens, user) = self.client.login(credentials).await?;
        self.cache
            .write()
            .await
            .set(QueryKey::CurrentUser, serde_json::to_value(&user)?);
        Ok((tokens, user))
    }

    /// Clear credentials and every cached query.
    pub async fn logout(&self) -> Result<()> {
        self.cache.write().await.clear();
        self.client.logout()
    }

    pub async fn current_user(&self) -> Result<User> {
        self.cached(QueryKey::CurrentUser, || self.client.current_user())
            .await
    }

    /// Capabilities of the signed-in user; none when the session is gone.
    pub async fn permissions(&self) -> PermissionSet {
        match self.current_user().await {
            Ok(user) => permissions::derive(Some(&user)),
            Err(e) => {
                log::debug!("No current user for permission check: {}", e);
                permissions::derive(None)
            }
        }
    }

    // ── Assets ────────────────────────────────────────────────────────────

    pub async fn assets(&self, filters: &AssetFilters) -> Result<Page<AssetListItem>> {
        let query = filters.to_query();
        self.cached(QueryKey::asset_list(&query), || {
            self.client.get(ASSETS_PATH, &query)
        })
        .await
    }

    pub async fn asset(&self, id: &str) -> Result<Asset> {
        require_id(id)?;
        let path = asset_path(id);
        self.cached(QueryKey::Asset(id.to_string()), || self.client.get(&path, &[]))
        .await
    }

    pub async fn update_asset(&self, id: &str, update: &AssetUpdate) -> Result<Asset> {
        require_id(id)?;
        let asset: Asset = self.client.patch(&asset_path(id), update).await?;
        self.invalidate(&[QueryScope::AssetLists], &[QueryKey::Asset(id.to_string())])
            .await;
        self.prime_asset(&asset).await;
        Ok(asset)
    }

    /// Soft-delete an asset.
    pub async fn delete_asset(&self, id: &str) -> Result<()> {
        require_id(id)?;
        self.client.delete(&asset_path(id)).await?;
        self.invalidate(&[QueryScope::AssetLists], &[QueryKey::Asset(id.to_string())])
            .await;
        Ok(())
    }

    pub async fn restore_asset(&self, id: &str) -> Result<Asset> {
        require_id(id)?;
        let asset: Asset = self
            .client
            .post_empty(&format!("{}restore/", asset_path(id)))
            .await?;
        self.invalidate(&[QueryScope::AssetLists], &[QueryKey::Asset(id.to_string())])
            .await;
        self.prime_asset(&asset).await;
        Ok(asset)
    }

    async fn prime_asset(&self, asset: &Asset) {
        match serde_json::to_value(asset) {
            Ok(value) => self
                .cache
                .write()
                .await
                .set(QueryKey::Asset(asset.id.clone()), value),
            Err(e) => log::warn!("Could not cache asset {}: {}", asset.id, e),
        }
    }

    // ── Uploads ───────────────────────────────────────────────────────────

    /// Request a one-time upload descriptor. Nothing is cached.
    pub async fn presign(&self, request: &PresignRequest) -> Result<PresignResponse> {
        if request.filename.trim().is_empty() {
            return Err(ValidationError::new("filename", "Filename is required").into());
        }
        self.client.post(PRESIGN_PATH, request).await
    }

    /// Register an uploaded object as an asset. Refreshes asset lists on success.
    pub async fn complete_upload(&self, request: &CompleteUploadRequest) -> Result<Asset> {
        let asset: Asset = self.client.post(COMPLETE_PATH, request).await?;
        self.invalidate(&[QueryScope::AssetLists], &[]).await;
        Ok(asset)
    }

    // ── Folders ───────────────────────────────────────────────────────────

    pub async fn folders(&self) -> Result<Vec<Folder>> {
        self.cached(QueryKey::Folders, || async {
            let list: ListResponse<Folder> = self.client.get(FOLDERS_PATH, &[]).await?;
            Ok(list.into_items())
        })
        .await
    }

    pub async fn folder(&self, id: &str) -> Result<Folder> {
        require_id(id)?;
        let path = folder_path(id);
        self.cached(QueryKey::Folder(id.to_string()), || self.client.get(&path, &[]))
        .await
    }

    pub async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<Folder> {
        let name = require_name("name", name, "Please enter a folder name")?;
        let draft = FolderDraft {
            name: Some(name),
            parent: parent.map(str::to_string),
        };
        let folder: Folder = self.client.post(FOLDERS_PATH, &draft).await?;
        self.invalidate(&[QueryScope::Folders], &[]).await;
        Ok(folder)
    }

    pub async fn update_folder(&self, id: &str, draft: &FolderDraft) -> Result<Folder> {
        require_id(id)?;
        if let Some(ref name) = draft.name {
            require_name("name", name, "Please enter a folder name")?;
        }
        let folder: Folder = self.client.patch(&folder_path(id), draft).await?;
        self.invalidate(&[QueryScope::Folders], &[]).await;
        Ok(folder)
    }

    /// Deleting a folder moves or hides its assets, so asset lists go too.
    pub async fn delete_folder(&self, id: &str) -> Result<()> {
        require_id(id)?;
        self.client.delete(&folder_path(id)).await?;
        self.invalidate(&[QueryScope::Folders, QueryScope::AssetLists], &[])
            .await;
        Ok(())
    }

    // ── Tags ──────────────────────────────────────────────────────────────

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        self.cached(QueryKey::Tags, || async {
            let list: ListResponse<Tag> = self.client.get(TAGS_PATH, &[]).await?;
            Ok(list.into_items())
        })
        .await
    }

    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        let name = require_name("name", name, "Please enter a tag name")?;
        let tag: Tag = self.client.post(TAGS_PATH, &TagDraft { name }).await?;
        self.invalidate(&[QueryScope::Tags], &[]).await;
        Ok(tag)
    }

    pub async fn update_tag(&self, id: &str, name: &str) -> Result<Tag> {
        require_id(id)?;
        let name = require_name("name", name, "Please enter a tag name")?;
        let tag: Tag = self.client.patch(&tag_path(id), &TagDraft { name }).await?;
        self.invalidate(&[QueryScope::Tags], &[]).await;
        Ok(tag)
    }

    pub async fn delete_tag(&self, id: &str) -> Result<()> {
        require_id(id)?;
        self.client.delete(&tag_path(id)).await?;
        self.invalidate(&[QueryScope::Tags, QueryScope::AssetLists], &[])
            .await;
        Ok(())
    }

    // ── Audit ─────────────────────────────────────────────────────────────

    pub async fn audit_logs(&self, filters: &AuditFilters) -> Result<Page<AuditLog>> {
        let query = filters.to_query();
        self.cached(QueryKey::audit_log(&query), || {
            self.client.get(AUDIT_PATH, &query)
        })
        .await
    }
}

fn asset_path(id: &str) -> String {
    format!("{}{}/", ASSETS_PATH, segment(id))
}

fn folder_path(id: &str) -> String {
    format!("{}{}/", FOLDERS_PATH, segment(id))
}

fn tag_path(id: &str) -> String {
    format!("{}{}/", TAGS_PATH, segment(id))
}

fn require_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::new("id", "Identifier is required"));
    }
    Ok(())
}

fn require_name(field: &'static str, name: &str, message: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}
