//! Dashboard user directory: the small set of internal users allowed
//! into the dashboard, with per-feature permission flags and a current
//! session.
//!
//! An explicit store object with injected persistence — callers pass it
//! around, nothing lives in module state. Passwords are stored as
//! SHA-256 digests and compared in constant time.

use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::RwLock;
use tracing::{info, instrument};

use crate::errors::{DirectoryError, MeliError, MeliResult};
use crate::store::PersistenceBackend;

/// Role of a dashboard user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The seeded owner account; protected from edits and deletion.
    Master,
    /// Full permissions, manageable by the master.
    Admin,
    /// Regular operator.
    User,
}

/// One grantable dashboard capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    /// See the dashboard overview.
    ViewDashboard,
    /// Link, edit and remove seller accounts.
    ManageAccounts,
    /// Create and edit products.
    ManageProducts,
    /// Trigger synchronization.
    ManageSync,
    /// See aggregate analytics.
    ViewAnalytics,
    /// Administer the user directory.
    ManageUsers,
}

impl Permission {
    /// Stable name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ViewDashboard => "view_dashboard",
            Self::ManageAccounts => "manage_accounts",
            Self::ManageProducts => "manage_products",
            Self::ManageSync => "manage_sync",
            Self::ViewAnalytics => "view_analytics",
            Self::ManageUsers => "manage_users",
        }
    }
}

/// Per-feature permission flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    /// See the dashboard overview.
    pub view_dashboard: bool,
    /// Link, edit and remove seller accounts.
    pub manage_accounts: bool,
    /// Create and edit products.
    pub manage_products: bool,
    /// Trigger synchronization.
    pub manage_sync: bool,
    /// See aggregate analytics.
    pub view_analytics: bool,
    /// Administer the user directory.
    pub manage_users: bool,
}

impl PermissionSet {
    /// Every flag granted.
    pub fn all() -> Self {
        Self {
            view_dashboard: true,
            manage_accounts: true,
            manage_products: true,
            manage_sync: true,
            view_analytics: true,
            manage_users: true,
        }
    }

    /// Read-only access: dashboard and analytics.
    pub fn read_only() -> Self {
        Self {
            view_dashboard: true,
            view_analytics: true,
            ..Self::default()
        }
    }

    /// Whether this set grants the given permission.
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ViewDashboard => self.view_dashboard,
            Permission::ManageAccounts => self.manage_accounts,
            Permission::ManageProducts => self.manage_products,
            Permission::ManageSync => self.manage_sync,
            Permission::ViewAnalytics => self.view_analytics,
            Permission::ManageUsers => self.manage_users,
        }
    }
}

/// One dashboard user record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardUser {
    /// Locally generated identifier.
    pub id: String,
    /// Login name, unique within the directory.
    pub username: String,
    /// SHA-256 hex digest of the password.
    pub password_digest: String,
    /// Role.
    pub role: Role,
    /// Granted capabilities.
    pub permissions: PermissionSet,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Id of the user who created this record, absent for the seeded
    /// master.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Input for creating a user.
#[derive(Clone, Debug)]
pub struct NewUser {
    /// Login name, must be unique.
    pub username: String,
    /// Plaintext password, digested before storage.
    pub password: String,
    /// Role.
    pub role: Role,
    /// Granted capabilities.
    pub permissions: PermissionSet,
}

/// Mutable fields of a user record.
#[derive(Clone, Debug, Default)]
pub struct UserUpdate {
    /// Replace the password.
    pub password: Option<String>,
    /// Replace the role.
    pub role: Option<Role>,
    /// Replace the permission flags.
    pub permissions: Option<PermissionSet>,
}

/// Persisted shape of the directory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DirectoryState {
    /// All user records.
    #[serde(default)]
    pub users: Vec<DashboardUser>,
    /// Id of the currently signed-in user, if any.
    #[serde(default)]
    pub session: Option<String>,
}

/// The user directory with injected persistence.
pub struct UserDirectory<B> {
    backend: B,
    state: RwLock<DirectoryState>,
}

impl<B: PersistenceBackend<DirectoryState>> UserDirectory<B> {
    /// Open the directory, loading the last snapshot if one exists.
    pub fn open(backend: B) -> MeliResult<Self> {
        let state = backend.load()?.unwrap_or_default();
        Ok(Self {
            backend,
            state: RwLock::new(state),
        })
    }

    /// Seed the master user when none exists yet. Idempotent.
    pub fn ensure_master(&self, username: &str, password: &str) -> MeliResult<()> {
        let mut state = self.state.write().expect("directory lock poisoned");
        if state.users.iter().any(|u| u.role == Role::Master) {
            return Ok(());
        }
        state.users.push(DashboardUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_digest: digest(password),
            role: Role::Master,
            permissions: PermissionSet::all(),
            created_at: Utc::now(),
            created_by: None,
        });
        self.commit(&state)
    }

    /// Sign in. On success the session is set and the record returned.
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> MeliResult<DashboardUser> {
        let mut state = self.state.write().expect("directory lock poisoned");
        let user = state
            .users
            .iter()
            .find(|u| u.username == username && verify(password, &u.password_digest))
            .cloned()
            .ok_or(MeliError::Directory(DirectoryError::InvalidCredentials))?;

        state.session = Some(user.id.clone());
        self.commit(&state)?;
        info!("user signed in");
        Ok(user)
    }

    /// Clear the session.
    pub fn logout(&self) -> MeliResult<()> {
        let mut state = self.state.write().expect("directory lock poisoned");
        state.session = None;
        self.commit(&state)
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<DashboardUser> {
        let state = self.state.read().expect("directory lock poisoned");
        let session = state.session.as_ref()?;
        state.users.iter().find(|u| &u.id == session).cloned()
    }

    /// Whether a session is active.
    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    /// Whether the signed-in user holds the permission. False without a
    /// session.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.current_user()
            .map(|u| u.permissions.allows(permission))
            .unwrap_or(false)
    }

    /// All users — empty unless the session user may manage users
    /// (listing the directory is itself an administrative view).
    pub fn list_users(&self) -> Vec<DashboardUser> {
        if !self.has_permission(Permission::ManageUsers) {
            return Vec::new();
        }
        self.state
            .read()
            .expect("directory lock poisoned")
            .users
            .clone()
    }

    /// Create a user. Requires the manage-users permission and a free
    /// username.
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub fn create_user(&self, new_user: NewUser) -> MeliResult<DashboardUser> {
        let creator = self.require_manager()?;

        let mut state = self.state.write().expect("directory lock poisoned");
        if state.users.iter().any(|u| u.username == new_user.username) {
            return Err(MeliError::Directory(DirectoryError::DuplicateUsername {
                username: new_user.username,
            }));
        }

        let user = DashboardUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: new_user.username,
            password_digest: digest(&new_user.password),
            role: new_user.role,
            permissions: new_user.permissions,
            created_at: Utc::now(),
            created_by: Some(creator.id),
        };
        state.users.push(user.clone());
        self.commit(&state)?;
        Ok(user)
    }

    /// Update a user. Requires the manage-users permission; the master
    /// record can only be altered by the master.
    pub fn update_user(&self, id: &str, update: UserUpdate) -> MeliResult<DashboardUser> {
        let actor = self.require_manager()?;

        let mut state = self.state.write().expect("directory lock poisoned");
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| {
                MeliError::Directory(DirectoryError::UnknownUser { id: id.to_string() })
            })?;

        if user.role == Role::Master && actor.role != Role::Master {
            return Err(MeliError::Directory(DirectoryError::MasterProtected));
        }

        if let Some(password) = update.password {
            user.password_digest = digest(&password);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(permissions) = update.permissions {
            user.permissions = permissions;
        }
        let updated = user.clone();
        self.commit(&state)?;
        Ok(updated)
    }

    /// Delete a user. The master record cannot be deleted.
    pub fn delete_user(&self, id: &str) -> MeliResult<()> {
        self.require_manager()?;

        let mut state = self.state.write().expect("directory lock poisoned");
        let Some(position) = state.users.iter().position(|u| u.id == id) else {
            return Err(MeliError::Directory(DirectoryError::UnknownUser {
                id: id.to_string(),
            }));
        };
        if state.users[position].role == Role::Master {
            return Err(MeliError::Directory(DirectoryError::MasterProtected));
        }
        state.users.remove(position);
        self.commit(&state)
    }

    fn require_manager(&self) -> MeliResult<DashboardUser> {
        let user = self
            .current_user()
            .ok_or(MeliError::Directory(DirectoryError::NotAuthenticated))?;
        if !user.permissions.allows(Permission::ManageUsers) {
            return Err(MeliError::Directory(DirectoryError::PermissionDenied {
                permission: Permission::ManageUsers.name(),
            }));
        }
        Ok(user)
    }

    fn commit(&self, state: &DirectoryState) -> MeliResult<()> {
        self.backend.save(state)
    }
}

impl<B> std::fmt::Debug for UserDirectory<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("directory lock poisoned");
        f.debug_struct("UserDirectory")
            .field("users", &state.users.len())
            .field("has_session", &state.session.is_some())
            .finish()
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn verify(password: &str, stored_digest: &str) -> bool {
    constant_time_eq(digest(password).as_bytes(), stored_digest.as_bytes())
}
