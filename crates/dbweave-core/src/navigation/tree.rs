// ── Navigation tree ──
//
// Parent id → ordered child ids, loaded one page at a time. Loading a page
// also fills the node-info cache with the parent and every child, stamped
// with their parent id. Structural mutations (delete, rename, move) apply
// locally first and roll back if the server rejects them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use indexmap::IndexSet;
use tracing::{debug, info, warn};

use super::node_info::NavNodeInfoResource;
use crate::backend::NavigationBackend;
use crate::error::CoreError;
use crate::model::{NavNode, ROOT_NODE_ID};
use crate::resource::{
    CachedMapResource, Dependent, Loaded, MapLoader, PageRange, ResourceAlias, ResourceHandle,
    ResourceKey,
};

/// Default number of children requested per page.
pub const DEFAULT_CHILDREN_LIMIT: usize = 100;

type Children = Vec<String>;

struct TreeLoader {
    backend: Arc<dyn NavigationBackend>,
    node_info: NavNodeInfoResource,
    limit: usize,
}

impl TreeLoader {
    async fn load_page(
        &self,
        parent: &str,
        range: PageRange,
    ) -> Result<(Children, bool), CoreError> {
        let page = self
            .backend
            .node_children(parent, range.offset, range.limit)
            .await?;
        let end_reached = page.children.len() < range.limit;

        let ids: Children = page.children.iter().map(|n| n.id.clone()).collect();
        let mut infos: Vec<(String, NavNode)> = page
            .children
            .into_iter()
            .map(|mut child| {
                child.parent_id = Some(parent.to_owned());
                (child.id.clone(), child)
            })
            .collect();
        if parent != ROOT_NODE_ID {
            let mut node = page.parent;
            if let Some(cached) = self.node_info.get(parent) {
                node.parent_id.clone_from(&cached.parent_id);
                node.details.clone_from(&cached.details);
            }
            infos.push((parent.to_owned(), node));
        }
        self.node_info.as_map().set_many(infos);

        debug!(
            parent,
            offset = range.offset,
            count = ids.len(),
            end_reached,
            "loaded children page"
        );
        Ok((ids, end_reached))
    }
}

#[async_trait]
impl MapLoader<String, Children> for TreeLoader {
    async fn load(&self, key: &ResourceKey<String>) -> Result<Loaded<String, Children>, CoreError> {
        match key {
            ResourceKey::Alias(ResourceAlias::Page {
                target: Some(parent),
                range,
            }) => {
                let (ids, end_reached) = self.load_page(parent, *range).await?;
                Ok(Loaded::page(vec![(parent.clone(), ids)], end_reached))
            }
            ResourceKey::Alias(_) => Err(CoreError::ValidationFailed {
                message: "navigation tree pages must name a parent node".into(),
            }),
            ResourceKey::Key(_) | ResourceKey::List(_) => {
                let mut entries = Vec::new();
                for parent in key.ids() {
                    let (ids, _) = self.load_page(&parent, PageRange::first(self.limit)).await?;
                    entries.push((parent, ids));
                }
                Ok(Loaded::many(entries))
            }
        }
    }

    /// Later pages append to what is cached, skipping ids already present.
    fn merge(&self, key: &ResourceKey<String>, previous: &Children, incoming: Children) -> Children {
        let appending = matches!(
            key,
            ResourceKey::Alias(ResourceAlias::Page { range, .. }) if range.offset > 0
        );
        if !appending {
            return incoming;
        }
        let mut merged: IndexSet<String> = previous.iter().cloned().collect();
        merged.extend(incoming);
        merged.into_iter().collect()
    }
}

/// The navigation tree structure.
#[derive(Clone)]
pub struct NavTreeResource {
    map: CachedMapResource<String, Children>,
    node_info: NavNodeInfoResource,
    backend: Arc<dyn NavigationBackend>,
    limit: usize,
}

impl NavTreeResource {
    /// Deleting a tree node cascades into `node_info`.
    pub fn new(
        backend: Arc<dyn NavigationBackend>,
        node_info: NavNodeInfoResource,
        children_limit: usize,
    ) -> Self {
        let limit = children_limit.max(1);
        let loader = Arc::new(TreeLoader {
            backend: Arc::clone(&backend),
            node_info: node_info.clone(),
            limit,
        });
        let map = CachedMapResource::new("nav-tree", loader);
        map.cascade_delete(node_info.as_map(), |id: &String| Some(id.clone()));

        Self {
            map,
            node_info,
            backend,
            limit,
        }
    }

    pub fn children_limit(&self) -> usize {
        self.limit
    }

    pub fn node_info(&self) -> &NavNodeInfoResource {
        &self.node_info
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Cached child ids of `parent`, in server order.
    pub fn get_children(&self, parent: &str) -> Option<Arc<Children>> {
        self.map.get(&parent.to_owned())
    }

    /// Every loaded descendant of `parent`, breadth first.
    pub fn get_nested_children(&self, parent: &str) -> Vec<String> {
        let mut nested = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([parent.to_owned()]);

        while let Some(id) = queue.pop_front() {
            let Some(children) = self.get_children(&id) else {
                continue;
            };
            for child in children.iter() {
                if child != parent && seen.insert(child.clone()) {
                    nested.push(child.clone());
                    queue.push_back(child.clone());
                }
            }
        }
        nested
    }

    pub fn is_loaded(&self, parent: &str) -> bool {
        self.map.page_state(Some(&parent.to_owned())).loaded
    }

    pub fn is_outdated(&self, parent: &str) -> bool {
        self.map.is_outdated(&ResourceKey::Key(parent.to_owned()))
    }

    /// Whether the server may have more children past the loaded pages.
    pub fn can_load_more(&self, parent: &str) -> bool {
        let state = self.map.page_state(Some(&parent.to_owned()));
        state.loaded && !state.end_reached
    }

    fn child_nodes(&self, parent: &str) -> Vec<Arc<NavNode>> {
        self.get_children(parent)
            .map(|ids| ids.iter().filter_map(|id| self.node_info.get(id)).collect())
            .unwrap_or_default()
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Children of `parent`, loading the first page if nothing is cached or
    /// the cache is stale.
    pub async fn load_children(&self, parent: &str) -> Result<Vec<Arc<NavNode>>, CoreError> {
        let before = self.get_children(parent);
        self.map
            .load_page(parent.to_owned(), PageRange::first(self.limit))
            .await?;
        self.prune_vanished(parent, before.as_deref());
        Ok(self.child_nodes(parent))
    }

    /// Append the next page of `parent`'s children.
    pub async fn load_more(&self, parent: &str) -> Result<Vec<Arc<NavNode>>, CoreError> {
        let state = self.map.page_state(Some(&parent.to_owned()));
        if !state.loaded || state.outdated {
            return self.load_children(parent).await;
        }
        if !state.end_reached {
            self.map
                .load_page(
                    parent.to_owned(),
                    PageRange::new(state.next_offset, self.limit),
                )
                .await?;
        }
        Ok(self.child_nodes(parent))
    }

    /// Mark `id` and its loaded subtree stale, in both caches.
    pub fn refresh_tree(&self, id: &str) {
        let mut ids = self.get_nested_children(id);
        ids.push(id.to_owned());
        let key = ResourceKey::from_ids(ids);
        self.map.mark_outdated(&key);
        self.node_info.as_map().mark_outdated(&key);
    }

    /// Drop children that a fresh first page no longer lists. Only a first
    /// page that is also the last one is authoritative.
    fn prune_vanished(&self, parent: &str, before: Option<&Children>) {
        let Some(before) = before else {
            return;
        };
        if self.can_load_more(parent) {
            return;
        }
        let Some(after) = self.get_children(parent) else {
            return;
        };
        let vanished: Vec<String> = before
            .iter()
            .filter(|id| !after.contains(id))
            .cloned()
            .collect();
        if !vanished.is_empty() {
            debug!(parent, count = vanished.len(), "children vanished on server");
            self.remove_subtree(&vanished);
        }
    }

    // ── Local structure edits ────────────────────────────────────────

    /// Remove `ids` and all their loaded descendants from the tree and the
    /// node-info cache, and unlink them from their parents.
    pub fn remove_subtree(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let mut doomed: IndexSet<String> = IndexSet::new();
        for id in ids {
            doomed.insert(id.clone());
            doomed.extend(self.get_nested_children(id));
        }

        for (parent, _) in self.parents_of(ids) {
            self.map
                .update(&parent, |children| {
                    children.iter().filter(|c| !ids.contains(c)).cloned().collect()
                });
        }
        self.map
            .delete(&ResourceKey::from_ids(doomed.into_iter().collect()));
    }

    /// Group `ids` by their known parent.
    fn parents_of(&self, ids: &[String]) -> HashMap<String, Vec<String>> {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for id in ids {
            let parent = self
                .node_info
                .get(id)
                .and_then(|n| n.parent_id.clone())
                .or_else(|| self.find_parent(id));
            if let Some(parent) = parent {
                parents.entry(parent).or_default().push(id.clone());
            }
        }
        parents
    }

    fn find_parent(&self, id: &str) -> Option<String> {
        self.map
            .snapshot()
            .into_iter()
            .find(|(_, children)| children.iter().any(|c| c == id))
            .map(|(parent, _)| parent)
    }

    // ── Server mutations ─────────────────────────────────────────────

    /// Delete nodes on the server. The nodes disappear from their parents
    /// immediately and come back if the server refuses.
    pub async fn delete_nodes(&self, ids: &[String]) -> Result<u32, CoreError> {
        let parents = self.parents_of(ids);
        let snapshot = self.snapshot_children(parents.keys());

        for parent in parents.keys() {
            self.map.update(parent, |children| {
                children.iter().filter(|c| !ids.contains(c)).cloned().collect()
            });
        }

        match self.backend.delete_nodes(ids).await {
            Ok(count) => {
                info!(count, "deleted navigation nodes");
                self.remove_subtree(ids);
                self.outdate_parents(parents.keys());
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "delete rejected, restoring nodes");
                self.restore_children(snapshot);
                Err(err)
            }
        }
    }

    /// Rename a node. The new name shows immediately; the server's answer
    /// replaces it, or the old node is restored on failure.
    pub async fn rename_node(&self, id: &str, name: &str) -> Result<Arc<NavNode>, CoreError> {
        let key = id.to_owned();
        let previous = self.node_info.load(id).await?;
        let info = self.node_info.as_map();
        info.update(&key, |node| NavNode {
            name: name.to_owned(),
            plain_name: None,
            ..node.clone()
        });

        match self.backend.rename_node(id, name).await {
            Ok(settled) => {
                info!(node = id, name = %settled, "renamed navigation node");
                let renamed = info
                    .update(&key, |node| NavNode {
                        name: settled.clone(),
                        ..node.clone()
                    })
                    .ok_or_else(|| CoreError::not_found("navigation node", id))?;
                if let Some(parent) = previous.parent_id.as_deref() {
                    self.map.mark_outdated(&ResourceKey::Key(parent.to_owned()));
                }
                Ok(renamed)
            }
            Err(err) => {
                warn!(node = id, error = %err, "rename rejected, restoring name");
                info.set(key, NavNode::clone(&previous));
                Err(err)
            }
        }
    }

    /// Move nodes under `folder`. Nodes leave their old parents and, when
    /// `folder`'s children are loaded, join it immediately.
    pub async fn move_nodes(&self, ids: &[String], folder: &str) -> Result<(), CoreError> {
        let parents = self.parents_of(ids);
        let touched: Vec<String> = parents
            .keys()
            .cloned()
            .chain(std::iter::once(folder.to_owned()))
            .collect();
        let children_snapshot = self.snapshot_children(touched.iter());
        let info_snapshot: Vec<(String, NavNode)> = ids
            .iter()
            .filter_map(|id| self.node_info.get(id).map(|n| (id.clone(), NavNode::clone(&n))))
            .collect();

        for parent in parents.keys() {
            self.map.update(parent, |children| {
                children.iter().filter(|c| !ids.contains(c)).cloned().collect()
            });
        }
        self.map.update(&folder.to_owned(), |children| {
            let mut merged: IndexSet<String> = children.iter().cloned().collect();
            merged.extend(ids.iter().cloned());
            merged.into_iter().collect()
        });
        for id in ids {
            self.node_info.as_map().update(id, |node| NavNode {
                parent_id: Some(folder.to_owned()),
                ..node.clone()
            });
        }

        match self.backend.move_nodes(ids, folder).await {
            Ok(()) => {
                info!(count = ids.len(), folder, "moved navigation nodes");
                self.outdate_parents(touched.iter());
                Ok(())
            }
            Err(err) => {
                warn!(folder, error = %err, "move rejected, restoring nodes");
                self.restore_children(children_snapshot);
                self.node_info.as_map().set_many(info_snapshot);
                Err(err)
            }
        }
    }

    fn snapshot_children<'a>(
        &self,
        parents: impl Iterator<Item = &'a String>,
    ) -> Vec<(String, Children)> {
        parents
            .filter_map(|p| self.get_children(p).map(|c| (p.clone(), Children::clone(&c))))
            .collect()
    }

    fn restore_children(&self, snapshot: Vec<(String, Children)>) {
        self.map.set_many(snapshot);
    }

    fn outdate_parents<'a>(&self, parents: impl Iterator<Item = &'a String>) {
        let parents: Vec<String> = parents.cloned().collect();
        if !parents.is_empty() {
            self.map.mark_outdated(&ResourceKey::from_ids(parents));
        }
    }

    pub fn as_map(&self) -> &CachedMapResource<String, Children> {
        &self.map
    }
}

impl Dependent for NavTreeResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.map.handle()
    }
}
