// ── API-to-domain type conversions ──
//
// Bridges raw `dbweave_api` wire types into canonical `crate::model`
// types. Conversions never fail: unparseable timestamps become `None` and
// unknown node types become `NodeKind::Other`.

use chrono::{DateTime, Utc};

use dbweave_api::graphql::models::{
    NavNodeInfo, ObjectPropertyInfo, ServerConfigInfo, ServerConfigInput, SessionInfo,
    UserAuthToken, UserInfo,
};

use crate::model::{
    AuthToken, DbObject, NavNode, NodeKind, ObjectProperty, ServerConfig, ServerConfigUpdate,
    SessionState, User,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an RFC 3339 timestamp, dropping values the server formats differently.
fn parse_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Infer the coarse kind from the server's `nodeType` and folder flag.
///
/// Node types are dotted paths such as `database.schema` or `connection`;
/// the last segment decides.
fn infer_node_kind(node_type: Option<&str>, folder: bool) -> NodeKind {
    let Some(raw) = node_type else {
        return if folder { NodeKind::Folder } else { NodeKind::Other };
    };
    let last = raw.rsplit(['.', '/']).next().unwrap_or(raw);
    match last.to_ascii_lowercase().as_str() {
        "project" => NodeKind::Project,
        "connection" | "datasource" => NodeKind::Connection,
        "folder" => NodeKind::Folder,
        "database" | "catalog" => NodeKind::Database,
        "schema" => NodeKind::Schema,
        "table" => NodeKind::Table,
        "view" => NodeKind::View,
        "column" | "attribute" => NodeKind::Column,
        "resource" | "script" => NodeKind::Resource,
        _ if folder => NodeKind::Folder,
        _ => NodeKind::Other,
    }
}

// ── Navigation ─────────────────────────────────────────────────────

impl From<ObjectPropertyInfo> for ObjectProperty {
    fn from(p: ObjectPropertyInfo) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name,
            description: p.description,
            category: p.category,
            data_type: p.data_type,
            value: p.value,
            features: p.features,
            order: p.order,
        }
    }
}

/// Convert a wire node. `parent_id` is not part of the wire type; callers
/// that know it set it afterwards.
impl From<NavNodeInfo> for NavNode {
    fn from(n: NavNodeInfo) -> Self {
        let kind = infer_node_kind(n.node_type.as_deref(), n.folder);
        let (object_type, object_features) = n
            .object
            .map(|o| (o.object_type, o.features))
            .unwrap_or_default();

        Self {
            id: n.id,
            parent_id: None,
            name: n.name,
            plain_name: n.plain_name,
            kind,
            node_type: n.node_type,
            uri: n.uri,
            icon: n.icon,
            description: n.description,
            project_id: n.project_id,
            folder: n.folder,
            inline: n.inline,
            navigable: n.navigable,
            filtered: n.filtered,
            has_children: n.has_children,
            features: n.features,
            object_type,
            object_features,
            details: n
                .node_details
                .map(|d| d.into_iter().map(ObjectProperty::from).collect()),
        }
    }
}

/// Extract the database object of a node fetched via `navObjectInfo`.
impl From<NavNodeInfo> for DbObject {
    fn from(n: NavNodeInfo) -> Self {
        let (object_type, features, properties) = n
            .object
            .map(|o| (o.object_type, o.features, o.properties.unwrap_or_default()))
            .unwrap_or_default();
        let mut properties: Vec<ObjectProperty> =
            properties.into_iter().map(ObjectProperty::from).collect();
        properties.sort_by_key(|p| p.order);

        Self {
            id: n.id,
            object_type,
            features,
            properties,
        }
    }
}

// ── Session ────────────────────────────────────────────────────────

impl From<SessionInfo> for SessionState {
    fn from(s: SessionInfo) -> Self {
        Self {
            created_at: parse_datetime(Some(&s.create_time)),
            last_access_at: parse_datetime(Some(&s.last_access_time)),
            locale: s.locale,
            cache_expired: s.cache_expired,
            valid: s.valid,
            remaining_ms: s.remaining_time,
        }
    }
}

impl From<ServerConfigInfo> for ServerConfig {
    fn from(c: ServerConfigInfo) -> Self {
        Self {
            name: c.name,
            version: c.version,
            workspace_id: c.workspace_id,
            server_url: c.server_url,
            configuration_mode: c.configuration_mode,
            development_mode: c.development_mode,
            anonymous_access_enabled: c.anonymous_access_enabled,
            admin_credentials_save_enabled: c.admin_credentials_save_enabled,
            enabled_features: c.enabled_features,
            enabled_auth_providers: c.enabled_auth_providers,
            supported_languages: c
                .supported_languages
                .into_iter()
                .map(|l| l.iso_code)
                .collect(),
        }
    }
}

impl From<&ServerConfigUpdate> for ServerConfigInput {
    fn from(u: &ServerConfigUpdate) -> Self {
        Self {
            server_name: u.server_name.clone(),
            server_url: u.server_url.clone(),
            admin_name: u.admin_name.clone(),
            admin_password: u.admin_password.clone(),
            anonymous_access_enabled: u.anonymous_access_enabled,
            admin_credentials_save_enabled: u.admin_credentials_save_enabled,
            enabled_features: u.enabled_features.clone(),
            enabled_auth_providers: u.enabled_auth_providers.clone(),
        }
    }
}

impl From<UserAuthToken> for AuthToken {
    fn from(t: UserAuthToken) -> Self {
        Self {
            provider: t.auth_provider,
            display_name: t.display_name,
            login_time: parse_datetime(t.login_time.as_deref()),
        }
    }
}

impl From<UserInfo> for User {
    fn from(u: UserInfo) -> Self {
        Self {
            id: u.user_id,
            display_name: u.display_name,
            role: u.auth_role,
            tokens: u.auth_tokens.into_iter().map(AuthToken::from).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wire_node(value: serde_json::Value) -> NavNodeInfo {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn node_kind_uses_last_type_segment() {
        assert_eq!(infer_node_kind(Some("database.schema"), false), NodeKind::Schema);
        assert_eq!(infer_node_kind(Some("connection"), false), NodeKind::Connection);
        assert_eq!(infer_node_kind(Some("sequences"), true), NodeKind::Folder);
        assert_eq!(infer_node_kind(None, false), NodeKind::Other);
    }

    #[test]
    fn nav_node_carries_object_and_details() {
        let node: NavNode = wire_node(serde_json::json!({
            "id": "database://pg/public/users",
            "name": "users",
            "nodeType": "database.table",
            "hasChildren": true,
            "object": { "type": "PostgreTable", "features": ["entity"] },
            "nodeDetails": [{ "id": "rows", "value": 42 }]
        }))
        .into();

        assert_eq!(node.kind, NodeKind::Table);
        assert_eq!(node.object_type.as_deref(), Some("PostgreTable"));
        assert_eq!(node.object_features, vec!["entity".to_owned()]);
        assert_eq!(node.details.unwrap()[0].value, serde_json::json!(42));
        assert!(node.parent_id.is_none());
    }

    #[test]
    fn db_object_sorts_properties() {
        let object: DbObject = wire_node(serde_json::json!({
            "id": "n",
            "name": "n",
            "object": {
                "properties": [
                    { "id": "b", "order": 2 },
                    { "id": "a", "order": 1 }
                ]
            }
        }))
        .into();
        assert_eq!(object.property("a").unwrap().order, 1);
        assert_eq!(object.properties[0].id.as_deref(), Some("a"));
    }

    #[test]
    fn session_timestamps_tolerate_garbage() {
        let state: SessionState = serde_json::from_value::<SessionInfo>(serde_json::json!({
            "createTime": "2024-03-01T10:00:00Z",
            "lastAccessTime": "yesterday"
        }))
        .unwrap()
        .into();
        assert!(state.created_at.is_some());
        assert!(state.last_access_at.is_none());
        assert!(state.valid);
    }
}
