// ── Node info cache ──

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::debug;

use crate::backend::NavigationBackend;
use crate::error::CoreError;
use crate::model::{NavNode, ROOT_NODE_ID};
use crate::resource::{
    CachedMapResource, Dependent, Loaded, MapLoader, ResourceHandle, ResourceKey,
};

struct NodeInfoLoader {
    backend: Arc<dyn NavigationBackend>,
}

#[async_trait]
impl MapLoader<String, NavNode> for NodeInfoLoader {
    async fn load(&self, key: &ResourceKey<String>) -> Result<Loaded<String, NavNode>, CoreError> {
        if key.is_alias() {
            return Err(CoreError::ValidationFailed {
                message: "node info can only be loaded by node id".into(),
            });
        }
        let nodes = try_join_all(
            key.ids()
                .into_iter()
                .map(|id| async move { self.backend.node_info(&id, false).await }),
        )
        .await?;
        Ok(Loaded::many(
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
        ))
    }

    /// A bare node-info reload knows neither the parent nor the details;
    /// keep what the cache already has.
    fn merge(&self, _key: &ResourceKey<String>, previous: &NavNode, mut incoming: NavNode) -> NavNode {
        if incoming.parent_id.is_none() {
            incoming.parent_id.clone_from(&previous.parent_id);
        }
        if incoming.details.is_none() {
            incoming.details.clone_from(&previous.details);
        }
        incoming
    }
}

/// Node id → [`NavNode`].
///
/// Filled mostly as a side effect of loading tree children; single nodes
/// can be reloaded on their own, optionally with detail properties.
#[derive(Clone)]
pub struct NavNodeInfoResource {
    map: CachedMapResource<String, NavNode>,
    backend: Arc<dyn NavigationBackend>,
}

impl NavNodeInfoResource {
    pub fn new(backend: Arc<dyn NavigationBackend>) -> Self {
        let loader = Arc::new(NodeInfoLoader {
            backend: Arc::clone(&backend),
        });
        Self {
            map: CachedMapResource::new("nav-node-info", loader),
            backend,
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<NavNode>> {
        self.map.get(&id.to_owned())
    }

    pub async fn load(&self, id: &str) -> Result<Arc<NavNode>, CoreError> {
        self.map.load_one(&id.to_owned()).await
    }

    /// Fetch `id` with its detail properties and store it, keeping the
    /// known parent.
    pub async fn load_details(&self, id: &str) -> Result<Arc<NavNode>, CoreError> {
        let mut node = self.backend.node_info(id, true).await?;
        if let Some(cached) = self.get(id) {
            if node.parent_id.is_none() {
                node.parent_id.clone_from(&cached.parent_id);
            }
        }
        debug!(node = id, "loaded node details");
        self.map.set(id.to_owned(), node);
        self.get(id)
            .ok_or_else(|| CoreError::not_found("navigation node", id))
    }

    /// Ancestor ids of `id`, outermost first, excluding the root.
    pub fn get_parents(&self, id: &str) -> Vec<String> {
        let mut parents = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent_id.clone());
        while let Some(parent) = current {
            if parent == ROOT_NODE_ID || parents.contains(&parent) {
                break;
            }
            current = self.get(&parent).and_then(|n| n.parent_id.clone());
            parents.push(parent);
        }
        parents.reverse();
        parents
    }

    /// Cached nodes from the outermost ancestor down to `id` itself.
    pub fn get_path(&self, id: &str) -> Vec<Arc<NavNode>> {
        self.get_parents(id)
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(id))
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn as_map(&self) -> &CachedMapResource<String, NavNode> {
        &self.map
    }
}

impl Dependent for NavNodeInfoResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.map.handle()
    }
}
