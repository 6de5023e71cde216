// Wire types for GraphQL responses and inputs.
//
// Field names follow the server schema (camelCase). These types are
// deliberately loose: everything optional on the server side is optional
// here, and unknown fields are ignored. `dbweave-core` converts them into
// its canonical domain model.

use serde::{Deserialize, Serialize};

// ── Navigation ──────────────────────────────────────────────────────

/// A navigator node as the server reports it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavNodeInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub plain_name: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub folder: bool,
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub navigable: bool,
    #[serde(default)]
    pub filtered: bool,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub object: Option<NavObjectInfo>,
    /// Only present when the node was requested with details.
    #[serde(default)]
    pub node_details: Option<Vec<ObjectPropertyInfo>>,
}

/// The database object behind a navigator node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavObjectInfo {
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub properties: Option<Vec<ObjectPropertyInfo>>,
}

/// A single named property of a database object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPropertyInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub order: i32,
}

/// `navNodeChildren` together with the parent's own `navNodeInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavNodeChildren {
    pub nav_node_children: Vec<NavNodeInfo>,
    pub nav_node_info: NavNodeInfo,
}

// ── Session / server ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub create_time: String,
    pub last_access_time: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub cache_expired: bool,
    #[serde(default = "default_true")]
    pub valid: bool,
    /// Milliseconds until the server expires the session.
    #[serde(default)]
    pub remaining_time: Option<i64>,
    #[serde(default)]
    pub action_parameters: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLanguage {
    pub iso_code: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default, rename = "serverURL")]
    pub server_url: Option<String>,
    #[serde(default)]
    pub configuration_mode: bool,
    #[serde(default)]
    pub development_mode: bool,
    #[serde(default)]
    pub anonymous_access_enabled: bool,
    #[serde(default)]
    pub admin_credentials_save_enabled: bool,
    #[serde(default)]
    pub enabled_features: Vec<String>,
    #[serde(default)]
    pub enabled_auth_providers: Vec<String>,
    #[serde(default)]
    pub supported_languages: Vec<ServerLanguage>,
}

/// Input for the `configureServer` mutation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "serverURL")]
    pub server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_access_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_credentials_save_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_auth_providers: Option<Vec<String>>,
}

// ── Authentication ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAuthToken {
    pub auth_provider: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub login_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub auth_role: Option<String>,
    #[serde(default)]
    pub auth_tokens: Vec<UserAuthToken>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    pub auth_status: String,
    #[serde(default)]
    pub user_tokens: Vec<UserAuthToken>,
}
