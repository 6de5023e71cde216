// In-memory backends shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::backend::{NavigationBackend, SessionBackend};
use crate::error::CoreError;
use crate::model::{
    DbObject, NavChildrenPage, NavNode, NodeKind, ObjectProperty, Permissions, ServerConfig,
    ServerConfigUpdate, SessionState, User,
};

pub(crate) fn node(id: &str) -> NavNode {
    NavNode {
        id: id.to_owned(),
        parent_id: None,
        name: id.rsplit('/').next().unwrap_or(id).to_owned(),
        plain_name: None,
        kind: NodeKind::Other,
        node_type: None,
        uri: None,
        icon: None,
        description: None,
        project_id: None,
        folder: false,
        inline: false,
        navigable: true,
        filtered: false,
        has_children: true,
        features: Vec::new(),
        object_type: None,
        object_features: Vec::new(),
        details: None,
    }
}

fn rejected() -> CoreError {
    CoreError::Api {
        message: "rejected".into(),
        code: Some("accessDenied".into()),
    }
}

// ── Navigation ───────────────────────────────────────────────────────

/// A server-side tree kept as parent id → child ids.
#[derive(Default)]
pub(crate) struct FakeNavigation {
    pub children: Mutex<BTreeMap<String, Vec<String>>>,
    pub names: Mutex<BTreeMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_mutations: AtomicBool,
}

impl FakeNavigation {
    pub fn with_tree(tree: &[(&str, &[&str])]) -> Self {
        let fake = Self::default();
        for (parent, children) in tree {
            fake.children.lock().unwrap().insert(
                (*parent).to_owned(),
                children.iter().map(|c| (*c).to_owned()).collect(),
            );
        }
        fake
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn node(&self, id: &str) -> NavNode {
        let mut node = node(id);
        if let Some(name) = self.names.lock().unwrap().get(id) {
            node.name.clone_from(name);
        }
        node
    }

    fn exists(&self, id: &str) -> bool {
        self.children
            .lock()
            .unwrap()
            .iter()
            .any(|(parent, children)| parent == id || children.iter().any(|c| c == id))
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(rejected())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NavigationBackend for FakeNavigation {
    async fn node_children(
        &self,
        parent: &str,
        offset: usize,
        limit: usize,
    ) -> Result<NavChildrenPage, CoreError> {
        self.record(format!("children {parent} {offset}+{limit}"));
        let ids = self
            .children
            .lock()
            .unwrap()
            .get(parent)
            .cloned()
            .unwrap_or_default();
        Ok(NavChildrenPage {
            parent: self.node(parent),
            children: ids
                .iter()
                .skip(offset)
                .take(limit)
                .map(|id| self.node(id))
                .collect(),
        })
    }

    async fn node_info(&self, id: &str, with_details: bool) -> Result<NavNode, CoreError> {
        self.record(format!("info {id} {with_details}"));
        if !self.exists(id) {
            return Err(CoreError::not_found("navigation node", id));
        }
        let mut node = self.node(id);
        if with_details {
            node.details = Some(vec![ObjectProperty {
                id: Some("rows".into()),
                display_name: Some("Row count".into()),
                description: None,
                category: None,
                data_type: Some("integer".into()),
                value: serde_json::json!(42),
                features: Vec::new(),
                order: 0,
            }]);
        }
        Ok(node)
    }

    async fn object_info(&self, id: &str) -> Result<DbObject, CoreError> {
        self.record(format!("object {id}"));
        Ok(DbObject {
            id: id.to_owned(),
            object_type: Some("table".into()),
            features: Vec::new(),
            properties: Vec::new(),
        })
    }

    async fn rename_node(&self, id: &str, name: &str) -> Result<String, CoreError> {
        self.record(format!("rename {id} {name}"));
        self.check()?;
        let settled = name.trim().to_owned();
        self.names
            .lock()
            .unwrap()
            .insert(id.to_owned(), settled.clone());
        Ok(settled)
    }

    async fn delete_nodes(&self, ids: &[String]) -> Result<u32, CoreError> {
        self.record(format!("delete {}", ids.join(",")));
        self.check()?;
        let mut tree = self.children.lock().unwrap();
        let mut count = 0;
        for children in tree.values_mut() {
            let before = children.len();
            children.retain(|c| !ids.contains(c));
            count += before - children.len();
        }
        Ok(u32::try_from(count).unwrap())
    }

    async fn move_nodes(&self, ids: &[String], folder: &str) -> Result<(), CoreError> {
        self.record(format!("move {} {folder}", ids.join(",")));
        self.check()?;
        let mut tree = self.children.lock().unwrap();
        for children in tree.values_mut() {
            children.retain(|c| !ids.contains(c));
        }
        tree.entry(folder.to_owned())
            .or_default()
            .extend(ids.iter().cloned());
        Ok(())
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Counts every call and serves configurable singletons.
pub(crate) struct FakeSession {
    pub permissions: Mutex<Vec<String>>,
    pub configuration_mode: AtomicBool,
    pub configured: Mutex<Vec<ServerConfigUpdate>>,
    pub user: Mutex<Option<User>>,
    pub session_loads: AtomicU32,
    pub permission_loads: AtomicU32,
    pub config_loads: AtomicU32,
    pub touches: AtomicU32,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self {
            permissions: Mutex::new(vec!["public".into()]),
            configuration_mode: AtomicBool::new(false),
            configured: Mutex::new(Vec::new()),
            user: Mutex::new(None),
            session_loads: AtomicU32::new(0),
            permission_loads: AtomicU32::new(0),
            config_loads: AtomicU32::new(0),
            touches: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SessionBackend for FakeSession {
    async fn session_state(&self) -> Result<SessionState, CoreError> {
        self.session_loads.fetch_add(1, Ordering::SeqCst);
        Ok(SessionState {
            created_at: None,
            last_access_at: None,
            locale: Some("en".into()),
            cache_expired: false,
            valid: true,
            remaining_ms: Some(60_000),
        })
    }

    async fn permissions(&self) -> Result<Permissions, CoreError> {
        self.permission_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.permissions.lock().unwrap().iter().cloned().collect())
    }

    async fn touch_session(&self) -> Result<(), CoreError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn server_config(&self) -> Result<ServerConfig, CoreError> {
        self.config_loads.fetch_add(1, Ordering::SeqCst);
        Ok(ServerConfig {
            name: "dbweave".into(),
            version: "24.1.0".into(),
            workspace_id: None,
            server_url: None,
            configuration_mode: self.configuration_mode.load(Ordering::SeqCst),
            development_mode: false,
            anonymous_access_enabled: true,
            admin_credentials_save_enabled: false,
            enabled_features: Vec::new(),
            enabled_auth_providers: vec!["local".into()],
            supported_languages: vec!["en".into()],
        })
    }

    async fn configure_server(&self, update: &ServerConfigUpdate) -> Result<(), CoreError> {
        self.configured.lock().unwrap().push(update.clone());
        self.configuration_mode.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn login(
        &self,
        _provider: &str,
        user: &str,
        password: &SecretString,
    ) -> Result<(), CoreError> {
        if password.expose_secret() != "secret" {
            return Err(CoreError::AuthenticationFailed {
                message: "invalid credentials".into(),
            });
        }
        *self.user.lock().unwrap() = Some(User {
            id: user.to_owned(),
            display_name: None,
            role: Some("admin".into()),
            tokens: Vec::new(),
        });
        self.permissions.lock().unwrap().push("admin".into());
        Ok(())
    }

    async fn logout(&self) -> Result<(), CoreError> {
        *self.user.lock().unwrap() = None;
        self.permissions.lock().unwrap().retain(|p| p != "admin");
        Ok(())
    }

    async fn active_user(&self) -> Result<Option<User>, CoreError> {
        Ok(self.user.lock().unwrap().clone())
    }
}
