//! Who may use the console, and which features each user may reach.
//!
//! Three layers, checked in order:
//! - the admin, who may do everything, including diagnostics and
//!   managing grants;
//! - the configured allow-list, whose users get every non-admin feature;
//! - the grant table, which gives individual users named features at
//!   runtime and is saved to a JSON file after every change.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use ho_domain::config::AccessConfig;
use ho_domain::error::Result;
use ho_sessions::UserId;

/// AI mode, photos and batch input.
pub const FEATURE_AI: &str = "ai";
/// The built-in wizards.
pub const FEATURE_FORMS: &str = "forms";
/// Grants every feature.
pub const FEATURE_ALL: &str = "all";

/// User id to granted feature names.
pub type GrantTable = BTreeMap<String, BTreeSet<String>>;

/// Access decisions for inbound events.
///
/// With no admin, no allow-list and no grants the policy is open: every
/// user may use every non-admin feature. Nobody is admin unless an admin
/// is configured, so diagnostics and grant management stay closed.
#[derive(Debug, Default)]
pub struct AccessPolicy {
    admin: Option<UserId>,
    allowed: HashSet<UserId>,
    grants: RwLock<GrantTable>,
    grants_file: Option<PathBuf>,
}

impl AccessPolicy {
    pub fn new(admin: Option<UserId>, allowed: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admin,
            allowed: allowed.into_iter().collect(),
            grants: RwLock::new(GrantTable::new()),
            grants_file: None,
        }
    }

    /// Build from config, loading the grant table when a file is set.
    ///
    /// A missing file is an empty table. A file that cannot be read or
    /// parsed is logged and also treated as empty.
    pub fn from_config(cfg: &AccessConfig) -> Self {
        let policy = Self::new(
            cfg.admin_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(UserId::from),
            cfg.allowed_users
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(UserId::from),
        );
        match cfg.permissions_file.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => policy.with_grants_file(path),
            _ => policy,
        }
    }

    /// Persist grants to `path`, seeding the table from it first.
    pub fn with_grants_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match load_grants(&path) {
            Ok(table) => {
                tracing::info!(path = %path.display(), users = table.len(), "grant table loaded");
                *self.grants.get_mut() = table;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "grant table unreadable, starting empty");
            }
        }
        self.grants_file = Some(path);
        self
    }

    fn is_open(&self) -> bool {
        self.admin.is_none() && self.allowed.is_empty() && self.grants.read().is_empty()
    }

    /// Only a configured admin is admin.
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admin.as_ref() == Some(user)
    }

    /// Whether `user` may use `feature`. An empty feature asks whether the
    /// user may use the console at all.
    pub fn has_permission(&self, user: &UserId, feature: &str) -> bool {
        if self.is_open() || self.is_admin(user) || self.allowed.contains(user) {
            return true;
        }
        let grants = self.grants.read();
        let Some(features) = grants.get(user.as_str()) else {
            return false;
        };
        feature.is_empty() || features.contains(feature) || features.contains(FEATURE_ALL)
    }

    pub fn is_allowed(&self, user: &UserId) -> bool {
        self.has_permission(user, "")
    }

    /// Add `feature` for `user`. Returns false when it was already granted.
    pub fn grant(&self, user: &str, feature: &str) -> Result<bool> {
        let feature = normalise_feature(feature);
        let added = self
            .grants
            .write()
            .entry(user.to_owned())
            .or_default()
            .insert(feature.clone());
        if added {
            tracing::info!(target_user = %user, feature = %feature, "feature granted");
            self.save()?;
        }
        Ok(added)
    }

    /// Remove `feature` from `user`. Returns false when it was not granted.
    /// A user left with no features leaves the table.
    pub fn revoke(&self, user: &str, feature: &str) -> Result<bool> {
        let feature = normalise_feature(feature);
        let removed = {
            let mut grants = self.grants.write();
            let Some(features) = grants.get_mut(user) else {
                return Ok(false);
            };
            let removed = features.remove(&feature);
            if features.is_empty() {
                grants.remove(user);
            }
            removed
        };
        if removed {
            tracing::info!(target_user = %user, feature = %feature, "feature revoked");
            self.save()?;
        }
        Ok(removed)
    }

    /// Copy of the grant table.
    pub fn grants(&self) -> GrantTable {
        self.grants.read().clone()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.grants_file else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.grants.read())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "grant table saved");
        Ok(())
    }
}

fn normalise_feature(feature: &str) -> String {
    feature.trim().to_lowercase()
}

fn load_grants(path: &Path) -> Result<GrantTable> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GrantTable::new()),
        Err(e) => Err(e.into()),
    }
}

/// Human-readable listing for the `users` action.
pub fn render_grants(table: &GrantTable) -> String {
    if table.is_empty() {
        return "📂 No users have been granted features.".to_owned();
    }
    let mut out = String::from("👥 Granted users\n");
    for (user, features) in table {
        let list: Vec<&str> = features.iter().map(String::as_str).collect();
        out.push_str(&format!("👤 {user}: {}\n", list.join(", ")));
    }
    out
}
