//! Command handlers behind the CLI.
//!
//! Each handler runs one user action against `AppState` and writes a short
//! human-readable report to `out`. Permission checks here only decide
//! whether to bother the server; the backend still enforces them.

use std::io::Write;
use std::path::PathBuf;

use crate::api::transport::Transport;
use crate::api::types::{
    AssetFilters, AssetStatus, AssetUpdate, AuditFilters, Credentials, FolderDraft, User,
};
use crate::error::{Error, Result, ValidationError};
use crate::permissions::{self, PermissionSet};
use crate::state::AppState;
use crate::upload::{UploadMetadata, UploadSource};

pub async fn login<T: Transport>(
    state: &AppState<T>,
    username: &str,
    password: &str,
    out: &mut impl Write,
) -> Result<()> {
    let credentials = Credentials {
        username: username.to_string(),
        password: password.to_string(),
    };
    let (_, user) = state.library.login(&credentials).await?;
    writeln!(out, "Signed in as {} ({})", user.username, user.role.display_name())?;
    Ok(())
}

pub async fn logout<T: Transport>(state: &AppState<T>, out: &mut impl Write) -> Result<()> {
    state.library.logout().await?;
    writeln!(out, "Signed out")?;
    Ok(())
}

pub async fn whoami<T: Transport>(state: &AppState<T>, out: &mut impl Write) -> Result<()> {
    let user = state.library.current_user().await?;
    let perms = permissions::derive(Some(&user));
    writeln!(out, "{} <{}>", user.username, user.email)?;
    writeln!(
        out,
        "Role: {} ({})",
        user.role.display_name(),
        user.role.description()
    )?;
    writeln!(out, "Can: {}", capability_names(&perms).join(", "))?;
    Ok(())
}

fn capability_names(perms: &PermissionSet) -> Vec<&'static str> {
    [
        (perms.can_view, "view"),
        (perms.can_upload, "upload"),
        (perms.can_edit, "edit"),
        (perms.can_delete, "delete"),
        (perms.can_manage_folders, "manage folders"),
        (perms.can_manage_tags, "manage tags"),
        (perms.can_view_audit, "view audit log"),
    ]
    .into_iter()
    .filter_map(|(allowed, name)| allowed.then_some(name))
    .collect()
}

// ── Assets ───────────────────────────────────────────────────────────────────

pub async fn list_assets<T: Transport>(
    state: &AppState<T>,
    filters: &AssetFilters,
    out: &mut impl Write,
) -> Result<()> {
    let page = state.library.assets(filters).await?;
    for item in &page.results {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            item.id,
            item.status.as_str(),
            human_size(item.size_bytes),
            item.filename_original
        )?;
    }
    writeln!(out, "{} of {} assets", page.results.len(), page.count)?;
    Ok(())
}

pub async fn show_asset<T: Transport>(state: &AppState<T>, id: &str, out: &mut impl Write) -> Result<()> {
    let asset = state.library.asset(id).await?;
    writeln!(out, "{}", asset.filename_original)?;
    writeln!(out, "  id:       {}", asset.id)?;
    writeln!(out, "  status:   {}", asset.status.as_str())?;
    writeln!(out, "  type:     {}", asset.mime_type)?;
    writeln!(out, "  size:     {}", human_size(asset.size_bytes))?;
    if let (Some(w), Some(h)) = (asset.width, asset.height) {
        writeln!(out, "  pixels:   {}x{}", w, h)?;
    }
    writeln!(
        out,
        "  folder:   {}",
        asset.folder_name.as_deref().unwrap_or("(root)")
    )?;
    if !asset.tags.is_empty() {
        let names: Vec<&str> = asset.tags.iter().map(|t| t.name.as_str()).collect();
        writeln!(out, "  tags:     {}", names.join(", "))?;
    }
    writeln!(out, "  url:      {}", asset.cdn_url)?;
    for variant in &asset.variants {
        writeln!(out, "  variant:  {} {}", variant.kind, variant.cdn_url)?;
    }
    if asset.is_deleted {
        writeln!(out, "  (deleted)")?;
    }
    Ok(())
}

pub async fn update_asset<T: Transport>(
    state: &AppState<T>,
    id: &str,
    update: &AssetUpdate,
    out: &mut impl Write,
) -> Result<()> {
    let user = state.library.current_user().await?;
    let current = state.library.asset(id).await?;
    if !permissions::can_modify(Some(&user), current.created_by) {
        return Err(not_allowed(&user, "edit this asset"));
    }
    let asset = state.library.update_asset(id, update).await?;
    writeln!(out, "Updated {} ({})", asset.filename_original, asset.id)?;
    Ok(())
}

pub async fn delete_asset<T: Transport>(state: &AppState<T>, id: &str, out: &mut impl Write) -> Result<()> {
    require(state, |p| p.can_delete, "delete assets").await?;
    state.library.delete_asset(id).await?;
    writeln!(out, "Deleted {}", id)?;
    Ok(())
}

pub async fn restore_asset<T: Transport>(state: &AppState<T>, id: &str, out: &mut impl Write) -> Result<()> {
    require(state, |p| p.can_delete, "restore assets").await?;
    let asset = state.library.restore_asset(id).await?;
    writeln!(out, "Restored {} ({})", asset.filename_original, asset.id)?;
    Ok(())
}

// ── Uploads ──────────────────────────────────────────────────────────────────

/// Upload every file concurrently. Fails if any file failed.
pub async fn upload<T: Transport>(
    state: &AppState<T>,
    paths: &[PathBuf],
    metadata: &UploadMetadata,
    out: &mut impl Write,
) -> Result<()> {
    require(state, |p| p.can_upload, "upload assets").await?;

    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        sources.push(UploadSource::from_path(path).await?);
    }

    let results = state.uploader.upload_many(sources, metadata).await;
    let mut first_error = None;
    for (task, result) in results {
        match result {
            Ok(asset) => writeln!(out, "{}\tuploaded\t{}", task.filename, asset.cdn_url)?,
            Err(e) => {
                writeln!(out, "{}\tfailed\t{}", task.filename, e)?;
                first_error.get_or_insert(e);
            }
        }
    }

    // A failed batch reports the first task's own error, keeping its status.
    first_error.map_or(Ok(()), Err)
}

// ── Folders & tags ───────────────────────────────────────────────────────────

pub async fn list_folders<T: Transport>(state: &AppState<T>, out: &mut impl Write) -> Result<()> {
    let mut folders = state.library.folders().await?;
    folders.sort_by(|a, b| a.full_path.cmp(&b.full_path));
    for folder in folders {
        let path = if folder.full_path.is_empty() {
            folder.name
        } else {
            folder.full_path
        };
        writeln!(out, "{}\t{}", folder.id, path)?;
    }
    Ok(())
}

pub async fn create_folder<T: Transport>(
    state: &AppState<T>,
    name: &str,
    parent: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    require(state, |p| p.can_manage_folders, "manage folders").await?;
    let folder = state.library.create_folder(name, parent).await?;
    writeln!(out, "Created folder {} ({})", folder.name, folder.id)?;
    Ok(())
}

pub async fn rename_folder<T: Transport>(
    state: &AppState<T>,
    id: &str,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    require(state, |p| p.can_manage_folders, "manage folders").await?;
    let draft = FolderDraft {
        name: Some(name.trim().to_string()),
        parent: None,
    };
    let folder = state.library.update_folder(id, &draft).await?;
    writeln!(out, "Renamed folder {} to {}", folder.id, folder.name)?;
    Ok(())
}

pub async fn delete_folder<T: Transport>(state: &AppState<T>, id: &str, out: &mut impl Write) -> Result<()> {
    require(state, |p| p.can_manage_folders, "manage folders").await?;
    state.library.delete_folder(id).await?;
    writeln!(out, "Deleted folder {}", id)?;
    Ok(())
}

pub async fn list_tags<T: Transport>(state: &AppState<T>, out: &mut impl Write) -> Result<()> {
    let mut tags = state.library.tags().await?;
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    for tag in tags {
        writeln!(out, "{}\t{}", tag.id, tag.name)?;
    }
    Ok(())
}

pub async fn create_tag<T: Transport>(state: &AppState<T>, name: &str, out: &mut impl Write) -> Result<()> {
    require(state, |p| p.can_manage_tags, "manage tags").await?;
    let tag = state.library.create_tag(name).await?;
    writeln!(out, "Created tag {} ({})", tag.name, tag.id)?;
    Ok(())
}

pub async fn rename_tag<T: Transport>(
    state: &AppState<T>,
    id: &str,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    require(state, |p| p.can_manage_tags, "manage tags").await?;
    let tag = state.library.update_tag(id, name).await?;
    writeln!(out, "Renamed tag {} to {}", tag.id, tag.name)?;
    Ok(())
}

pub async fn delete_tag<T: Transport>(state: &AppState<T>, id: &str, out: &mut impl Write) -> Result<()> {
    require(state, |p| p.can_manage_tags, "manage tags").await?;
    state.library.delete_tag(id).await?;
    writeln!(out, "Deleted tag {}", id)?;
    Ok(())
}

// ── Audit ────────────────────────────────────────────────────────────────────

pub async fn audit<T: Transport>(
    state: &AppState<T>,
    filters: &AuditFilters,
    out: &mut impl Write,
) -> Result<()> {
    require(state, |p| p.can_view_audit, "view the audit log").await?;
    let page = state.library.audit_logs(filters).await?;
    for entry in &page.results {
        writeln!(
            out,
            "{}\t{}\t{}\t{} {}",
            entry.created_at,
            entry.actor_username.as_deref().unwrap_or("-"),
            entry.action,
            entry.target_type,
            entry.target_id
        )?;
    }
    writeln!(out, "{} of {} entries", page.results.len(), page.count)?;
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn require<T, F>(state: &AppState<T>, allowed: F, action: &str) -> Result<()>
where
    T: Transport,
    F: Fn(&PermissionSet) -> bool,
{
    let user = state.library.current_user().await?;
    if !allowed(&permissions::derive(Some(&user))) {
        return Err(not_allowed(&user, action));
    }
    Ok(())
}

fn not_allowed(user: &User, action: &str) -> Error {
    ValidationError::new(
        "role",
        format!(
            "Your role ({}) does not allow you to {}",
            user.role.display_name(),
            action
        ),
    )
    .into()
}

/// Parse a status given on the command line.
pub fn parse_status(value: &str) -> std::result::Result<AssetStatus, String> {
    match value.to_ascii_lowercase().as_str() {
        "pending" => Ok(AssetStatus::Pending),
        "approved" => Ok(AssetStatus::Approved),
        other => Err(format!("unknown status '{}' (expected pending or approved)", other)),
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
