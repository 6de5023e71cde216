// ── Server event bridge ──
//
// Turns pushed socket events into cache invalidation. Classification is a
// pure function so it can be tested without a socket; `EventBridge::apply`
// performs the resulting action against the live resources.

use std::sync::Arc;

use dbweave_api::events::{ServerEvent, ServerEventId};
use dbweave_api::SessionExpiredLatch;
use indexmap::IndexSet;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::model::ROOT_NODE_ID;
use crate::navigation::NavTreeResource;
use crate::session::{PermissionsResource, ServerConfigResource, SessionResource, UserResource};

/// What a server event means for the local caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    OutdateSession,
    OutdatePermissions,
    OutdateServerConfig,
    SessionExpired,
    /// The session's user no longer exists.
    ClearUser,
    /// Nodes appeared under these parents.
    NodesCreated { parents: Vec<String> },
    /// Nodes changed in place.
    NodesUpdated { ids: Vec<String> },
    NodesDeleted { ids: Vec<String> },
    Ignore,
}

/// Node ids an event refers to: `nodePaths` (array) or `nodePath`.
fn node_paths(event: &ServerEvent) -> Vec<String> {
    let payload = &event.payload;
    if let Some(paths) = payload.get("nodePaths").and_then(|v| v.as_array()) {
        return paths
            .iter()
            .filter_map(|p| p.as_str().map(str::to_owned))
            .collect();
    }
    payload
        .get("nodePath")
        .and_then(|v| v.as_str())
        .map(|p| vec![p.to_owned()])
        .unwrap_or_default()
}

/// Parent of a node path: everything before the last `/`, or the root.
fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) if !trimmed[..i].ends_with(':') && !trimmed[..i].ends_with(":/") => {
            trimmed[..i].to_owned()
        }
        _ => ROOT_NODE_ID.to_owned(),
    }
}

/// Map a server event to the cache action it requires.
pub fn classify(event: &ServerEvent) -> EventAction {
    let Some(kind) = event.kind() else {
        trace!(id = %event.id, "unknown server event");
        return EventAction::Ignore;
    };
    match kind {
        ServerEventId::SessionState => EventAction::OutdateSession,
        ServerEventId::SessionExpired => EventAction::SessionExpired,
        ServerEventId::ConfigChanged => EventAction::OutdateServerConfig,
        ServerEventId::SubjectPermissionsUpdated => EventAction::OutdatePermissions,
        ServerEventId::UserDeleted => EventAction::ClearUser,
        ServerEventId::ObjectCreated | ServerEventId::DatasourceCreated => {
            let parents: IndexSet<String> = match event
                .payload
                .get("parentNodePath")
                .and_then(|v| v.as_str())
            {
                Some(parent) => IndexSet::from([parent.to_owned()]),
                None => node_paths(event).iter().map(|p| parent_path(p)).collect(),
            };
            EventAction::NodesCreated {
                parents: parents.into_iter().collect(),
            }
        }
        ServerEventId::ObjectUpdated | ServerEventId::DatasourceUpdated => {
            EventAction::NodesUpdated {
                ids: node_paths(event),
            }
        }
        ServerEventId::ObjectDeleted | ServerEventId::DatasourceDeleted => {
            EventAction::NodesDeleted {
                ids: node_paths(event),
            }
        }
        ServerEventId::SessionWebsocketConnected => EventAction::Ignore,
    }
}

/// Applies server events to the resources they affect.
#[derive(Clone)]
pub struct EventBridge {
    pub(crate) tree: NavTreeResource,
    pub(crate) session: SessionResource,
    pub(crate) permissions: PermissionsResource,
    pub(crate) server_config: ServerConfigResource,
    pub(crate) user: UserResource,
    pub(crate) latch: SessionExpiredLatch,
}

impl EventBridge {
    pub fn apply(&self, event: &ServerEvent) {
        let action = classify(event);
        debug!(id = %event.id, ?action, "server event");
        self.perform(&action);
    }

    fn perform(&self, action: &EventAction) {
        match action {
            EventAction::OutdateSession => self.session.resource().mark_outdated(),
            EventAction::OutdatePermissions => self.permissions.resource().mark_outdated(),
            EventAction::OutdateServerConfig => self.server_config.resource().mark_outdated(),
            EventAction::SessionExpired => {
                self.latch.trip();
                self.session.resource().mark_outdated();
            }
            EventAction::ClearUser => self.user.resource().clear(),
            EventAction::NodesCreated { parents } => {
                for parent in parents {
                    self.tree
                        .as_map()
                        .mark_outdated(&crate::resource::ResourceKey::Key(parent.clone()));
                }
            }
            EventAction::NodesUpdated { ids } => {
                for id in ids {
                    self.tree.refresh_tree(id);
                }
            }
            EventAction::NodesDeleted { ids } => self.tree.remove_subtree(ids),
            EventAction::Ignore => {}
        }
    }

    /// Something was missed; treat every mirrored resource as stale.
    fn outdate_everything(&self) {
        self.session.resource().mark_outdated();
        self.permissions.resource().mark_outdated();
        self.server_config.resource().mark_outdated();
        self.tree
            .as_map()
            .mark_outdated(&crate::resource::ResourceKey::all());
    }

    /// Apply events from `rx` until cancelled or the socket goes away.
    pub fn spawn(
        self,
        mut rx: broadcast::Receiver<Arc<ServerEvent>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = rx.recv() => match result {
                        Ok(event) => self.apply(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event bridge lagged, outdating all resources");
                            self.outdate_everything();
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("event bridge stopped");
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{NavigationBackend, SessionBackend};
    use crate::navigation::NavNodeInfoResource;
    use crate::testing::{FakeNavigation, FakeSession};

    fn event(value: serde_json::Value) -> ServerEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn classifies_singleton_events() {
        assert_eq!(
            classify(&event(serde_json::json!({ "id": "config_changed" }))),
            EventAction::OutdateServerConfig
        );
        assert_eq!(
            classify(&event(serde_json::json!({ "id": "subject_permissions_updated" }))),
            EventAction::OutdatePermissions
        );
        assert_eq!(
            classify(&event(serde_json::json!({ "id": "session_expired" }))),
            EventAction::SessionExpired
        );
        assert_eq!(
            classify(&event(serde_json::json!({ "id": "something_new" }))),
            EventAction::Ignore
        );
    }

    #[test]
    fn created_nodes_outdate_their_parents() {
        let action = classify(&event(serde_json::json!({
            "id": "object_created",
            "topicId": "navigator",
            "nodePaths": ["database://pg/public/a", "database://pg/public/b"]
        })));
        assert_eq!(
            action,
            EventAction::NodesCreated {
                parents: vec!["database://pg/public".into()]
            }
        );

        let top = classify(&event(serde_json::json!({
            "id": "datasource_created",
            "nodePath": "database://pg"
        })));
        assert_eq!(top, EventAction::NodesCreated { parents: vec![String::new()] });
    }

    #[test]
    fn interleaved_parents_are_outdated_once() {
        let action = classify(&event(serde_json::json!({
            "id": "object_created",
            "nodePaths": [
                "database://pg/public/a",
                "database://pg/audit/x",
                "database://pg/public/b"
            ]
        })));
        assert_eq!(
            action,
            EventAction::NodesCreated {
                parents: vec!["database://pg/public".into(), "database://pg/audit".into()]
            }
        );
    }

    #[test]
    fn explicit_parent_wins() {
        let action = classify(&event(serde_json::json!({
            "id": "object_created",
            "nodePaths": ["x"],
            "parentNodePath": "folder"
        })));
        assert_eq!(action, EventAction::NodesCreated { parents: vec!["folder".into()] });
    }

    #[tokio::test]
    async fn bridge_applies_actions() {
        let nav = Arc::new(FakeNavigation::with_tree(&[
            ("pg", &["pg/public"]),
            ("pg/public", &["pg/public/users"]),
        ]));
        let nav_backend: Arc<dyn NavigationBackend> = nav;
        let session_fake = Arc::new(FakeSession::default());
        let session_backend: Arc<dyn SessionBackend> = session_fake.clone();

        let info = NavNodeInfoResource::new(Arc::clone(&nav_backend));
        let bridge = EventBridge {
            tree: NavTreeResource::new(nav_backend, info, 10),
            session: SessionResource::new(Arc::clone(&session_backend)),
            permissions: PermissionsResource::new(Arc::clone(&session_backend)),
            server_config: ServerConfigResource::new(Arc::clone(&session_backend)),
            user: UserResource::new(session_backend),
            latch: SessionExpiredLatch::new(),
        };
        bridge.tree.load_children("pg").await.unwrap();
        bridge.tree.load_children("pg/public").await.unwrap();
        bridge.server_config.resource().load().await.unwrap();

        bridge.apply(&event(serde_json::json!({ "id": "config_changed" })));
        assert!(bridge.server_config.resource().is_outdated());
        bridge.server_config.resource().load().await.unwrap();
        assert_eq!(session_fake.config_loads.load(Ordering::SeqCst), 2);

        bridge.apply(&event(serde_json::json!({
            "id": "object_deleted",
            "nodePaths": ["pg/public"]
        })));
        assert!(bridge.tree.node_info().get("pg/public/users").is_none());
        assert_eq!(bridge.tree.get_children("pg").unwrap().len(), 0);

        bridge.apply(&event(serde_json::json!({ "id": "session_expired" })));
        assert!(bridge.latch.is_tripped());
    }
}
