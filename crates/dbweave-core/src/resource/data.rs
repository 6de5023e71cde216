// ── Singleton reactive cache ──
//
// `CachedDataResource` is a `CachedMapResource` with exactly one key,
// for server state that has no natural id (session, permissions, server
// configuration).

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use super::dependency::{Dependent, ResourceHandle};
use super::key::ResourceKey;
use super::map::{CachedMapResource, Loaded, MapLoader, ResourceEvent};
use super::metadata::Metadata;
use crate::error::CoreError;

/// Fetches the value of a [`CachedDataResource`].
#[async_trait]
pub trait DataLoader<T: Send + Sync + 'static>: Send + Sync + 'static {
    async fn load(&self) -> Result<T, CoreError>;
}

struct SingletonLoader<T>(Arc<dyn DataLoader<T>>);

#[async_trait]
impl<T: Send + Sync + 'static> MapLoader<(), T> for SingletonLoader<T> {
    async fn load(&self, _key: &ResourceKey<()>) -> Result<Loaded<(), T>, CoreError> {
        Ok(Loaded::one((), self.0.load().await?))
    }
}

/// A lazily loaded, observable singleton.
pub struct CachedDataResource<T: Send + Sync + 'static> {
    map: CachedMapResource<(), T>,
}

impl<T: Send + Sync + 'static> Clone for CachedDataResource<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

const KEY: ResourceKey<()> = ResourceKey::Key(());

impl<T: Send + Sync + 'static> CachedDataResource<T> {
    pub fn new(name: &'static str, loader: Arc<dyn DataLoader<T>>) -> Self {
        Self {
            map: CachedMapResource::new(name, Arc::new(SingletonLoader(loader))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.map.name()
    }

    /// The cached value, stale or not.
    pub fn data(&self) -> Option<Arc<T>> {
        self.map.get(&())
    }

    pub fn is_loaded(&self) -> bool {
        self.map.is_loaded(&KEY)
    }

    pub fn is_outdated(&self) -> bool {
        self.map.is_outdated(&KEY)
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.map.error_of(&KEY)
    }

    pub fn metadata(&self) -> Metadata {
        self.map.metadata(&KEY).unwrap_or_default()
    }

    /// Return the cached value, loading it if missing or stale.
    pub async fn load(&self) -> Result<Arc<T>, CoreError> {
        self.map.load(&KEY).await?;
        self.data_or_not_found()
    }

    /// Reload regardless of cache state.
    pub async fn refresh(&self) -> Result<Arc<T>, CoreError> {
        self.map.refresh(&KEY).await?;
        self.data_or_not_found()
    }

    pub fn set(&self, value: T) {
        self.map.set((), value);
    }

    pub fn mark_outdated(&self) {
        self.map.mark_outdated(&KEY);
    }

    pub fn mark_updated(&self) {
        self.map.mark_updated(&KEY);
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent<()>> {
        self.map.subscribe()
    }

    pub fn watch_version(&self) -> watch::Receiver<u64> {
        self.map.watch_version()
    }

    pub fn on_event(&self, listener: impl Fn(&ResourceEvent<()>) + Send + Sync + 'static) {
        self.map.on_event(listener);
    }

    /// Whenever this resource goes stale, `dependent` goes stale too.
    pub fn outdate_resource(&self, dependent: &impl Dependent) {
        self.map.outdate_resource(dependent);
    }

    /// Whenever this resource is cleared, `dependent` is cleared too.
    pub fn connect(&self, dependent: &impl Dependent) {
        self.map.connect(dependent);
    }

    /// The keyed resource underneath.
    pub fn as_map(&self) -> &CachedMapResource<(), T> {
        &self.map
    }

    fn data_or_not_found(&self) -> Result<Arc<T>, CoreError> {
        self.data()
            .ok_or_else(|| CoreError::not_found(self.map.name(), "<singleton>"))
    }
}

impl<T: Send + Sync + 'static> Dependent for CachedDataResource<T> {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        self.map.handle()
    }
}
