// ── Navigation domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Id of the invisible root every top-level node hangs off.
pub const ROOT_NODE_ID: &str = "";

/// Coarse node classification derived from the server's `nodeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum NodeKind {
    Project,
    Connection,
    Folder,
    Database,
    Schema,
    Table,
    View,
    Column,
    Resource,
    Other,
}

/// A node of the navigation tree.
///
/// `parent_id` is a back-reference only; the tree structure itself lives in
/// `NavTreeResource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub plain_name: Option<String>,
    pub kind: NodeKind,
    pub node_type: Option<String>,
    pub uri: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<String>,

    pub folder: bool,
    pub inline: bool,
    pub navigable: bool,
    pub filtered: bool,
    pub has_children: bool,

    pub features: Vec<String>,
    pub object_type: Option<String>,
    pub object_features: Vec<String>,

    /// Detail properties, present once loaded "with details".
    pub details: Option<Vec<ObjectProperty>>,
}

impl NavNode {
    pub fn display_name(&self) -> &str {
        self.plain_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// A named property of a database object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub data_type: Option<String>,
    pub value: serde_json::Value,
    pub features: Vec<String>,
    pub order: i32,
}

/// The database object behind a navigation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbObject {
    /// Id of the node this object belongs to.
    pub id: String,
    pub object_type: Option<String>,
    pub features: Vec<String>,
    pub properties: Vec<ObjectProperty>,
}

impl DbObject {
    pub fn property(&self, id: &str) -> Option<&ObjectProperty> {
        self.properties.iter().find(|p| p.id.as_deref() == Some(id))
    }
}

/// One page of a node's children, as a backend reports it.
#[derive(Debug, Clone)]
pub struct NavChildrenPage {
    pub parent: NavNode,
    pub children: Vec<NavNode>,
}
