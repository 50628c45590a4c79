//! Role-based capability table.
//!
//! Client-side checks are advisory: the backend enforces authorization, this
//! only decides which actions are worth offering.

use crate::api::types::{Role, User};

/// Capabilities derived from a role. Never stored, always recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionSet {
    pub can_view: bool,
    pub can_upload: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage_folders: bool,
    pub can_manage_tags: bool,
    pub can_view_audit: bool,
    pub is_owner: bool,
    pub is_admin: bool,
    pub is_editor: bool,
}

impl PermissionSet {
    /// Everything false: no signed-in user.
    pub const NONE: PermissionSet = PermissionSet {
        can_view: false,
        can_upload: false,
        can_edit: false,
        can_delete: false,
        can_manage_folders: false,
        can_manage_tags: false,
        can_view_audit: false,
        is_owner: false,
        is_admin: false,
        is_editor: false,
    };

    /// Capability row for a role.
    pub const fn for_role(role: Role) -> PermissionSet {
        match role {
            Role::Owner => OWNER,
            Role::Admin => ADMIN,
            Role::Editor => EDITOR,
            Role::Uploader => UPLOADER,
            Role::Viewer => VIEWER,
        }
    }
}

const OWNER: PermissionSet = PermissionSet {
    is_owner: true,
    ..ADMIN
};

const ADMIN: PermissionSet = PermissionSet {
    can_delete: true,
    can_view_audit: true,
    is_admin: true,
    ..EDITOR
};

const EDITOR: PermissionSet = PermissionSet {
    can_edit: true,
    can_manage_folders: true,
    can_manage_tags: true,
    is_editor: true,
    ..UPLOADER
};

const UPLOADER: PermissionSet = PermissionSet {
    can_upload: true,
    ..VIEWER
};

const VIEWER: PermissionSet = PermissionSet {
    can_view: true,
    ..PermissionSet::NONE
};

/// Permissions for the current user, or none when signed out.
pub fn derive(user: Option<&User>) -> PermissionSet {
    user.map(|u| PermissionSet::for_role(u.role))
        .unwrap_or(PermissionSet::NONE)
}

/// Whether `user` may modify a resource created by `owner_id`.
///
/// Editors and above may modify anything; uploaders only their own resources.
pub fn can_modify(user: Option<&User>, owner_id: u64) -> bool {
    match user {
        Some(u) if u.role >= Role::Editor => true,
        Some(u) if u.role == Role::Uploader => u.id == owner_id,
        _ => false,
    }
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Owner => "Owner",
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Uploader => "Uploader",
            Role::Viewer => "Viewer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Owner => "Full system access with all permissions",
            Role::Admin => "Manage all assets, folders, tags, and view audit logs",
            Role::Editor => "Create, edit all assets, manage folders and tags",
            Role::Uploader => "Upload and edit own assets, read-only for others",
            Role::Viewer => "Read-only access to all assets",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, role: Role) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role,
            is_active: true,
            date_joined: None,
        }
    }

    #[test]
    fn test_no_user_has_nothing() {
        assert_eq!(derive(None), PermissionSet::NONE);
        assert!(!can_modify(None, 1));
    }

    #[test]
    fn test_can_upload_iff_uploader_or_above() {
        for role in Role::ALL {
            let expected = matches!(role, Role::Owner | Role::Admin | Role::Editor | Role::Uploader);
            assert_eq!(derive(Some(&user(1, role))).can_upload, expected, "{:?}", role);
        }
    }

    #[test]
    fn test_every_role_can_view() {
        for role in Role::ALL {
            assert!(derive(Some(&user(1, role))).can_view);
        }
    }

    #[test]
    fn test_role_table() {
        let owner = PermissionSet::for_role(Role::Owner);
        assert!(owner.is_owner && owner.is_admin && owner.is_editor);
        assert!(owner.can_delete && owner.can_view_audit);

        let admin = PermissionSet::for_role(Role::Admin);
        assert!(!admin.is_owner);
        assert!(admin.is_admin && admin.can_delete && admin.can_view_audit);

        let editor = PermissionSet::for_role(Role::Editor);
        assert!(editor.can_edit && editor.can_manage_folders && editor.can_manage_tags);
        assert!(!editor.can_delete && !editor.can_view_audit && !editor.is_admin);

        let uploader = PermissionSet::for_role(Role::Uploader);
        assert!(uploader.can_upload);
        assert!(!uploader.can_edit && !uploader.can_manage_folders && !uploader.is_editor);

        let viewer = PermissionSet::for_role(Role::Viewer);
        assert_eq!(
            viewer,
            PermissionSet {
                can_view: true,
                ..PermissionSet::NONE
            }
        );
    }

    #[test]
    fn test_higher_roles_are_supersets() {
        let flags = |p: PermissionSet| {
            [
                p.can_view,
                p.can_upload,
                p.can_edit,
                p.can_delete,
                p.can_manage_folders,
                p.can_manage_tags,
                p.can_view_audit,
                p.is_owner,
                p.is_admin,
                p.is_editor,
            ]
        };
        // Role::ALL is ordered from most to least privileged
        for pair in Role::ALL.windows(2) {
            let higher = flags(PermissionSet::for_role(pair[0]));
            let lower = flags(PermissionSet::for_role(pair[1]));
            for (h, l) in higher.iter().zip(lower.iter()) {
                assert!(*h || !*l, "{:?} lacks a capability of {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn test_can_modify() {
        for role in [Role::Owner, Role::Admin, Role::Editor] {
            assert!(can_modify(Some(&user(1, role)), 1));
            assert!(can_modify(Some(&user(1, role)), 99));
        }
        assert!(can_modify(Some(&user(5, Role::Uploader)), 5));
        assert!(!can_modify(Some(&user(5, Role::Uploader)), 6));
        assert!(!can_modify(Some(&user(5, Role::Viewer)), 5));
        assert!(!can_modify(Some(&user(5, Role::Viewer)), 6));
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(Role::Uploader.display_name(), "Uploader");
        assert_eq!(Role::Viewer.description(), "Read-only access to all assets");
    }
}
