// ── Session and server domain types ──

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the server-side session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub created_at: Option<DateTime<Utc>>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub locale: Option<String>,
    pub cache_expired: bool,
    pub valid: bool,
    /// Milliseconds until the server expires the session.
    pub remaining_ms: Option<i64>,
}

/// Permission ids granted to the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn has(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for Permissions {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Server identity and feature switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub workspace_id: Option<String>,
    pub server_url: Option<String>,
    /// The server has not been configured yet; the setup wizard applies.
    pub configuration_mode: bool,
    pub development_mode: bool,
    pub anonymous_access_enabled: bool,
    pub admin_credentials_save_enabled: bool,
    pub enabled_features: Vec<String>,
    pub enabled_auth_providers: Vec<String>,
    pub supported_languages: Vec<String>,
}

/// Pending changes to the server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfigUpdate {
    pub server_name: Option<String>,
    pub server_url: Option<String>,
    pub admin_name: Option<String>,
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    pub anonymous_access_enabled: Option<bool>,
    pub admin_credentials_save_enabled: Option<bool>,
    pub enabled_features: Option<Vec<String>>,
    pub enabled_auth_providers: Option<Vec<String>>,
}

impl ServerConfigUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An authentication token held by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub provider: String,
    pub display_name: Option<String>,
    pub login_time: Option<DateTime<Utc>>,
}

/// The user bound to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub tokens: Vec<AuthToken>,
}

/// Locally persisted session preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub locale: Option<String>,
}
