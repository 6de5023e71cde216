// ── Database object cache ──

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::future::try_join_all;

use super::node_info::NavNodeInfoResource;
use crate::backend::NavigationBackend;
use crate::error::CoreError;
use crate::model::DbObject;
use crate::resource::{
    CachedMapResource, Dependent, Loaded, MapLoader, ResourceHandle, ResourceKey,
};

struct ObjectLoader {
    backend: Arc<dyn NavigationBackend>,
}

#[async_trait]
impl MapLoader<String, DbObject> for ObjectLoader {
    async fn load(&self, key: &ResourceKey<String>) -> Result<Loaded<String, DbObject>, CoreError> {
        if key.is_alias() {
            return Err(CoreError::ValidationFailed {
                message: "database objects can only be loaded by node id".into(),
            });
        }
        let objects = try_join_all(
            key.ids()
                .into_iter()
                .map(|id| async move { self.backend.object_info(&id).await }),
        )
        .await?;
        Ok(Loaded::many(
            objects.into_iter().map(|o| (o.id.clone(), o)).collect(),
        ))
    }
}

/// Node id → the [`DbObject`] behind it.
///
/// Follows the node-info cache: an updated node marks its object stale, a
/// deleted node drops it.
#[derive(Clone)]
pub struct DbObjectResource {
    map: CachedMapResource<String, DbObject>,
}

impl DbObjectResource {
    pub fn new(backend: Arc<dyn NavigationBackend>, node_info: &NavNodeInfoResource) -> Self {
        let map = CachedMapResource::new("db-object", Arc::new(ObjectLoader { backend }));
        node_info
            .as_map()
            .sync(&map, |id: &String| Some(id.clone()));
        Self { map }
    }

    pub fn get(&self, id: &str) -> Option<Arc<DbObject>> {
        self.map.get(&id.to_owned())
    }

    pub async fn load(&self, id: &str) -> Result<Arc<DbObject>, CoreError> {
        self.map.load_one(&id.to_owned()).await
    }

    /// Load objects for several nodes in one go.
    pub async fn load_many(&self, ids: &[String]) -> Result<Vec<Arc<DbObject>>, CoreError> {
        self.map.load(&ResourceKey::from_ids(ids.to_vec())).await
    }

    pub fn as_map(&self) -> &CachedMapResource<String, DbObject> {
        &self.map
    }
}

impl Dependent for DbObjectResource {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.map.handle()
    }
}
