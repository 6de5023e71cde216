// ── Keyed reactive cache ──
//
// Concurrent storage with lazy, coalesced loads and push-based change
// notification. Every mutation bumps a `watch` version counter and
// publishes a `ResourceEvent` on a broadcast channel; synchronous
// listeners (the dependency graph) run before the mutating call returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexSet;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace, warn};

use super::dependency::{self, Listener};
use super::key::{PageRange, ResourceAlias, ResourceId, ResourceKey};
use super::metadata::Metadata;
use crate::error::CoreError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

type SharedLoad = Shared<BoxFuture<'static, Result<(), Arc<CoreError>>>>;

/// A loader call other callers can join, tagged with the generation it
/// started at.
struct InFlight {
    started: u64,
    load: SharedLoad,
}

// ── Loader seam ──────────────────────────────────────────────────────

/// Result of one loader call.
#[derive(Debug)]
pub struct Loaded<K, V> {
    /// Entities in server order.
    pub entries: Vec<(K, V)>,
    /// For page aliases: the server has nothing past this page.
    pub end_reached: bool,
}

impl<K, V> Loaded<K, V> {
    pub fn one(key: K, value: V) -> Self {
        Self {
            entries: vec![(key, value)],
            end_reached: true,
        }
    }

    pub fn many(entries: Vec<(K, V)>) -> Self {
        Self {
            entries,
            end_reached: true,
        }
    }

    /// A page whose completeness the loader determined itself.
    pub fn page(entries: Vec<(K, V)>, end_reached: bool) -> Self {
        Self {
            entries,
            end_reached,
        }
    }

    pub fn empty() -> Self {
        Self::many(Vec::new())
    }
}

/// Fetches data for a [`CachedMapResource`].
#[async_trait]
pub trait MapLoader<K: ResourceId, V: Send + Sync + 'static>: Send + Sync + 'static {
    /// Load everything `key` names. For `Key`/`List` keys, ids the result
    /// omits are treated as gone on the server and dropped from the cache.
    async fn load(&self, key: &ResourceKey<K>) -> Result<Loaded<K, V>, CoreError>;

    /// Combine a freshly loaded value with the one already cached.
    fn merge(&self, _key: &ResourceKey<K>, _previous: &V, incoming: V) -> V {
        incoming
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Change notifications published by a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent<K> {
    /// A load for this key finished and its data was stored.
    DataUpdate(ResourceKey<K>),
    /// Data for this key was marked stale.
    DataOutdated(ResourceKey<K>),
    /// These items were written (by a load or `set`).
    ItemUpdate(ResourceKey<K>),
    /// These items were removed.
    ItemDelete(ResourceKey<K>),
    /// Everything was dropped.
    Cleared,
}

/// Progress of paged loading for one page target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageState {
    /// At least one page has been loaded.
    pub loaded: bool,
    /// Offset the next page starts at.
    pub next_offset: usize,
    /// The last loaded page was short.
    pub end_reached: bool,
    /// Any loaded page is stale.
    pub outdated: bool,
}

// ── CachedMapResource ────────────────────────────────────────────────

/// A lazily loaded, observable, keyed cache of server data.
///
/// Cheaply cloneable: clones share the same storage.
pub struct CachedMapResource<K: ResourceId, V: Send + Sync + 'static> {
    pub(super) inner: Arc<MapInner<K, V>>,
}

impl<K: ResourceId, V: Send + Sync + 'static> Clone for CachedMapResource<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(super) struct MapInner<K: ResourceId, V: Send + Sync + 'static> {
    pub(super) id: u64,
    pub(super) name: &'static str,
    loader: Arc<dyn MapLoader<K, V>>,

    data: DashMap<K, Arc<V>>,
    meta: DashMap<ResourceKey<K>, Metadata>,
    /// Ids each loaded alias resolved to, in server order.
    aliases: DashMap<ResourceAlias<K>, Vec<K>>,
    in_flight: DashMap<ResourceKey<K>, InFlight>,

    /// Bumped by `delete` and `clear`; loads compare against it so a
    /// result that was superseded mid-flight is not written back.
    generation: AtomicU64,
    cleared_at: AtomicU64,
    deleted_at: DashMap<K, u64>,

    events: broadcast::Sender<ResourceEvent<K>>,
    version: watch::Sender<u64>,
    pub(super) listeners: ArcSwap<Vec<Listener<K>>>,
}

impl<K: ResourceId, V: Send + Sync + 'static> CachedMapResource<K, V> {
    pub fn new(name: &'static str, loader: Arc<dyn MapLoader<K, V>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (version, _) = watch::channel(0u64);

        Self {
            inner: Arc::new(MapInner {
                id: dependency::next_resource_id(),
                name,
                loader,
                data: DashMap::new(),
                meta: DashMap::new(),
                aliases: DashMap::new(),
                in_flight: DashMap::new(),
                generation: AtomicU64::new(0),
                cleared_at: AtomicU64::new(0),
                deleted_at: DashMap::new(),
                events,
                version,
                listeners: ArcSwap::from_pointee(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &K) -> Option<Arc<V>> {
        self.inner.get(id)
    }

    pub fn has(&self, id: &K) -> bool {
        self.inner.data.contains_key(id)
    }

    /// Cached values for everything `key` currently resolves to.
    pub fn get_many(&self, key: &ResourceKey<K>) -> Vec<Arc<V>> {
        self.resolve(key)
            .iter()
            .filter_map(|id| self.inner.get(id))
            .collect()
    }

    /// Ids `key` currently resolves to. Aliases resolve through their last
    /// successful load.
    pub fn resolve(&self, key: &ResourceKey<K>) -> Vec<K> {
        self.inner.resolve(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.data.iter().map(|e| e.key().clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<(K, Arc<V>)> {
        self.inner
            .data
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn is_loaded(&self, key: &ResourceKey<K>) -> bool {
        self.inner.meta_keys(key).iter().all(|k| {
            self.inner
                .meta
                .get(k)
                .is_some_and(|m| m.loaded)
        })
    }

    pub fn is_outdated(&self, key: &ResourceKey<K>) -> bool {
        self.inner.meta.iter().any(|e| covers(key, e.key()) && e.outdated)
    }

    /// Error recorded by the most recent failed load of `key`.
    pub fn error_of(&self, key: &ResourceKey<K>) -> Option<Arc<CoreError>> {
        self.inner
            .meta_keys(key)
            .iter()
            .find_map(|k| self.inner.meta.get(k).and_then(|m| m.error.clone()))
    }

    pub fn metadata(&self, key: &ResourceKey<K>) -> Option<Metadata> {
        self.inner.meta.get(key).map(|m| m.value().clone())
    }

    /// Paging progress for pages scoped to `target`.
    pub fn page_state(&self, target: Option<&K>) -> PageState {
        let mut state = PageState::default();
        let mut last_offset = None;

        for entry in &self.inner.meta {
            let ResourceKey::Alias(alias @ ResourceAlias::Page { range, .. }) = entry.key() else {
                continue;
            };
            if alias.target() != target || !entry.loaded {
                continue;
            }
            state.loaded = true;
            state.outdated |= entry.outdated;
            state.next_offset = state.next_offset.max(range.end());
            if last_offset.is_none_or(|offset| range.offset >= offset) {
                last_offset = Some(range.offset);
                state.end_reached = entry.end_reached;
            }
        }
        state
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Return cached data for `key`, loading whatever is missing or stale.
    ///
    /// Concurrent calls for the same key share a single loader call.
    pub async fn load(&self, key: &ResourceKey<K>) -> Result<Vec<Arc<V>>, CoreError> {
        if let Some(pending) = self.inner.pending(key) {
            self.fetch(pending).await?;
        }
        Ok(self.get_many(key))
    }

    /// Load a single entity, failing with `NotFound` if the server has none.
    pub async fn load_one(&self, id: &K) -> Result<Arc<V>, CoreError> {
        self.load(&ResourceKey::Key(id.clone())).await?;
        self.get(id)
            .ok_or_else(|| CoreError::not_found(self.inner.name, format!("{id:?}")))
    }

    /// Reload `key` regardless of cache state.
    pub async fn refresh(&self, key: &ResourceKey<K>) -> Result<Vec<Arc<V>>, CoreError> {
        self.fetch(key.clone()).await?;
        Ok(self.get_many(key))
    }

    /// Load a page of the collection scoped to `target`.
    pub async fn load_page(
        &self,
        target: K,
        range: PageRange,
    ) -> Result<Vec<Arc<V>>, CoreError> {
        self.load(&ResourceKey::page(target, range)).await
    }

    async fn fetch(&self, key: ResourceKey<K>) -> Result<(), CoreError> {
        let load = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) if !self.inner.superseded(&key, entry.get().started) => {
                trace!(resource = self.inner.name, key = %key, "joining in-flight load");
                entry.get().load.clone()
            }
            Entry::Occupied(mut entry) => {
                // A clear or delete landed after this flight started, so its
                // result will be fenced off.
                debug!(
                    resource = self.inner.name,
                    key = %key,
                    "in-flight load superseded, starting a new one"
                );
                let flight = self.start_load(key.clone());
                let load = flight.load.clone();
                entry.insert(flight);
                load
            }
            Entry::Vacant(entry) => {
                let flight = self.start_load(key.clone());
                let load = flight.load.clone();
                entry.insert(flight);
                load
            }
        };

        load.await.map_err(|source| CoreError::Load {
            resource: self.inner.name,
            key: key.to_string(),
            source,
        })
    }

    fn start_load(&self, key: ResourceKey<K>) -> InFlight {
        let started = self.inner.generation.load(Ordering::SeqCst);
        let this = self.clone();
        let load = async move { this.run_loader(key, started).await }
            .boxed()
            .shared();
        InFlight { started, load }
    }

    async fn run_loader(self, key: ResourceKey<K>, started: u64) -> Result<(), Arc<CoreError>> {
        debug!(resource = self.inner.name, key = %key, "loading");

        let result = match self.inner.loader.load(&key).await {
            Ok(loaded) => {
                self.inner.apply_loaded(&key, loaded, started);
                Ok(())
            }
            Err(err) => {
                let err = Arc::new(err);
                warn!(resource = self.inner.name, key = %key, error = %err, "load failed");
                if !self.inner.superseded(&key, started) {
                    self.inner.record_error(&key, &err);
                }
                Err(err)
            }
        };

        self.inner
            .in_flight
            .remove_if(&key, |_, flight| flight.started == started);
        result
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Store a value as if it had been loaded.
    pub fn set(&self, id: K, value: V) {
        self.inner.set_many(vec![(id, value)]);
    }

    pub fn set_many(&self, entries: Vec<(K, V)>) {
        self.inner.set_many(entries);
    }

    /// Replace a cached value with `f(current)`. Returns the new value, or
    /// `None` if nothing was cached for `id`.
    pub fn update(&self, id: &K, f: impl FnOnce(&V) -> V) -> Option<Arc<V>> {
        let current = self.inner.get(id)?;
        self.inner.set_many(vec![(id.clone(), f(&current))]);
        self.inner.get(id)
    }

    /// Remove everything `key` names. In-flight loads started earlier will
    /// not resurrect the removed ids.
    pub fn delete(&self, key: &ResourceKey<K>) {
        self.inner.delete(key);
    }

    /// Drop all data and metadata. In-flight loads started earlier are
    /// discarded when they finish.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Flag `key` as stale without dropping its data.
    pub fn mark_outdated(&self, key: &ResourceKey<K>) {
        self.inner.mark_outdated(key);
    }

    /// Clear the stale flag on `key`.
    pub fn mark_updated(&self, key: &ResourceKey<K>) {
        self.inner.mark_updated(key);
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Receive every event this resource publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent<K>> {
        self.inner.events.subscribe()
    }

    /// Watch the mutation counter.
    pub fn watch_version(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.inner.version.borrow()
    }
}

// ── Inner state transitions ──────────────────────────────────────────

impl<K: ResourceId, V: Send + Sync + 'static> MapInner<K, V> {
    fn get(&self, id: &K) -> Option<Arc<V>> {
        self.data.get(id).map(|v| Arc::clone(v.value()))
    }

    fn resolve(&self, key: &ResourceKey<K>) -> Vec<K> {
        match key {
            ResourceKey::Alias(ResourceAlias::All) if !self.aliases.contains_key(&ResourceAlias::All) => {
                self.data.iter().map(|e| e.key().clone()).collect()
            }
            ResourceKey::Alias(alias) => self
                .aliases
                .get(alias)
                .map(|ids| ids.value().clone())
                .unwrap_or_default(),
            other => other.ids(),
        }
    }

    /// Metadata entries that describe `key`.
    fn meta_keys(&self, key: &ResourceKey<K>) -> Vec<ResourceKey<K>> {
        match key {
            ResourceKey::Key(id) => vec![ResourceKey::Key(id.clone())],
            ResourceKey::List(ids) => ids.iter().cloned().map(ResourceKey::Key).collect(),
            ResourceKey::Alias(_) => vec![key.clone()],
        }
    }

    /// The part of `key` that needs a loader call, if any.
    fn pending(&self, key: &ResourceKey<K>) -> Option<ResourceKey<K>> {
        let needs = |k: &ResourceKey<K>| self.meta.get(k).is_none_or(|m| m.needs_load());

        match key {
            ResourceKey::Key(id) => {
                (needs(key) || !self.data.contains_key(id)).then(|| key.clone())
            }
            ResourceKey::List(ids) => {
                let missing: Vec<K> = ids
                    .iter()
                    .filter(|id| needs(&ResourceKey::Key((*id).clone())) || !self.data.contains_key(*id))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| ResourceKey::from_ids(missing))
            }
            ResourceKey::Alias(_) => needs(key).then(|| key.clone()),
        }
    }

    fn deleted_since(&self, id: &K, started: u64) -> bool {
        self.deleted_at.get(id).is_some_and(|g| *g > started)
    }

    /// A load of `key` that began at generation `started` will have its
    /// result discarded in part or in full.
    fn superseded(&self, key: &ResourceKey<K>, started: u64) -> bool {
        started < self.cleared_at.load(Ordering::SeqCst)
            || self
                .deleted_at
                .iter()
                .any(|e| *e.value() > started && key.includes(e.key()))
    }

    fn apply_loaded(&self, key: &ResourceKey<K>, loaded: Loaded<K, V>, started: u64) {
        if started < self.cleared_at.load(Ordering::SeqCst) {
            debug!(resource = self.name, key = %key, "discarding load superseded by clear");
            return;
        }

        let Loaded {
            entries,
            end_reached,
        } = loaded;

        let mut updated: IndexSet<K> = IndexSet::with_capacity(entries.len());
        for (id, value) in entries {
            if self.deleted_since(&id, started) {
                trace!(resource = self.name, id = ?id, "skipping id deleted during load");
                continue;
            }
            let value = match self.get(&id) {
                Some(previous) => self.loader.merge(key, &previous, value),
                None => value,
            };
            self.data.insert(id.clone(), Arc::new(value));
            self.meta
                .insert(ResourceKey::Key(id.clone()), Metadata::loaded(true));
            updated.insert(id);
        }

        let mut removed = Vec::new();
        match key {
            ResourceKey::Key(_) | ResourceKey::List(_) => {
                for id in key.ids() {
                    if updated.contains(&id) || self.deleted_since(&id, started) {
                        continue;
                    }
                    self.meta.remove(&ResourceKey::Key(id.clone()));
                    if self.data.remove(&id).is_some() {
                        removed.push(id);
                    }
                }
            }
            ResourceKey::Alias(alias) => {
                if matches!(alias, ResourceAlias::All) {
                    let stale: Vec<K> = self
                        .data
                        .iter()
                        .map(|e| e.key().clone())
                        .filter(|id| !updated.contains(id))
                        .collect();
                    for id in stale {
                        self.data.remove(&id);
                        self.meta.remove(&ResourceKey::Key(id.clone()));
                        removed.push(id);
                    }
                }
                if alias.range().is_some_and(|r| r.offset == 0) {
                    self.drop_pages(alias.target(), Some(alias));
                }
                self.aliases
                    .insert(alias.clone(), updated.iter().cloned().collect());
                self.meta.insert(key.clone(), Metadata::loaded(end_reached));
            }
        }

        debug!(
            resource = self.name,
            key = %key,
            updated = updated.len(),
            removed = removed.len(),
            "load applied"
        );
        self.bump_version();
        if !removed.is_empty() {
            self.emit(&ResourceEvent::ItemDelete(ResourceKey::from_ids(removed)));
        }
        if !updated.is_empty() {
            self.emit(&ResourceEvent::ItemUpdate(ResourceKey::from_ids(
                updated.into_iter().collect(),
            )));
        }
        self.emit(&ResourceEvent::DataUpdate(key.clone()));
    }

    fn record_error(&self, key: &ResourceKey<K>, err: &Arc<CoreError>) {
        for k in self.meta_keys(key) {
            self.meta
                .entry(k)
                .and_modify(|m| m.error = Some(Arc::clone(err)))
                .or_insert_with(|| Metadata::failed(Arc::clone(err)));
        }
    }

    /// Forget page aliases scoped to `target`, except `keep`.
    fn drop_pages(&self, target: Option<&K>, keep: Option<&ResourceAlias<K>>) {
        let stale: Vec<ResourceAlias<K>> = self
            .meta
            .iter()
            .filter_map(|e| match e.key() {
                ResourceKey::Alias(alias @ ResourceAlias::Page { .. })
                    if alias.target() == target && Some(alias) != keep =>
                {
                    Some(alias.clone())
                }
                _ => None,
            })
            .collect();

        for alias in stale {
            self.meta.remove(&ResourceKey::Alias(alias.clone()));
            self.aliases.remove(&alias);
        }
    }

    fn set_many(&self, entries: Vec<(K, V)>) {
        if entries.is_empty() {
            return;
        }
        let mut ids = Vec::with_capacity(entries.len());
        for (id, value) in entries {
            self.data.insert(id.clone(), Arc::new(value));
            self.meta
                .insert(ResourceKey::Key(id.clone()), Metadata::loaded(true));
            ids.push(id);
        }
        self.bump_version();
        self.emit(&ResourceEvent::ItemUpdate(ResourceKey::from_ids(ids)));
    }

    fn delete(&self, key: &ResourceKey<K>) {
        let ids = self.resolve(key);
        if ids.is_empty() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        for id in &ids {
            self.data.remove(id);
            self.meta.remove(&ResourceKey::Key(id.clone()));
            self.deleted_at.insert(id.clone(), generation);
            self.drop_pages(Some(id), None);
        }
        for mut alias in self.aliases.iter_mut() {
            alias.value_mut().retain(|k| !ids.contains(k));
        }

        debug!(resource = self.name, count = ids.len(), "deleted");
        self.bump_version();
        self.emit(&ResourceEvent::ItemDelete(ResourceKey::from_ids(ids)));
    }

    pub(super) fn clear(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cleared_at.store(generation, Ordering::SeqCst);

        self.data.clear();
        self.meta.clear();
        self.aliases.clear();
        self.deleted_at.clear();

        debug!(resource = self.name, "cleared");
        self.bump_version();
        self.emit(&ResourceEvent::Cleared);
    }

    pub(super) fn mark_outdated(&self, key: &ResourceKey<K>) {
        for mut entry in self.meta.iter_mut() {
            if covers(key, entry.key()) {
                entry.outdated = true;
            }
        }
        trace!(resource = self.name, key = %key, "marked outdated");
        self.bump_version();
        self.emit(&ResourceEvent::DataOutdated(key.clone()));
    }

    fn mark_updated(&self, key: &ResourceKey<K>) {
        for mut entry in self.meta.iter_mut() {
            if covers(key, entry.key()) {
                entry.outdated = false;
            }
        }
        self.bump_version();
    }

    fn bump_version(&self) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.version.send_modify(|v| *v += 1);
    }

    fn emit(&self, event: &ResourceEvent<K>) {
        // Ignore send errors -- just means no active subscribers right now
        let _ = self.events.send(event.clone());
        dependency::notify(self.id, self.name, &self.listeners, event);
    }
}

/// Whether metadata stored under `meta_key` is part of `key`.
fn covers<K: ResourceId>(key: &ResourceKey<K>, meta_key: &ResourceKey<K>) -> bool {
    match (key, meta_key) {
        (ResourceKey::Alias(ResourceAlias::All), _) => true,
        (ResourceKey::Alias(_), other) => key == other,
        (_, ResourceKey::Key(id)) => key.includes(id),
        (_, ResourceKey::Alias(alias)) => alias.target().is_some_and(|t| key.includes(t)),
        (_, ResourceKey::List(_)) => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32};

    use pretty_assertions::assert_eq;
    use tokio::sync::{Notify, Semaphore};

    use super::*;

    /// Returns `value * 10 + call_count` for every requested id.
    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicU32,
        fail: AtomicBool,
    }

    #[async_trait]
    impl MapLoader<u32, u32> for CountingLoader {
        async fn load(&self, key: &ResourceKey<u32>) -> Result<Loaded<u32, u32>, CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::Network {
                    reason: "offline".into(),
                });
            }
            let ids = match key {
                ResourceKey::Alias(ResourceAlias::All) => vec![1, 2, 3],
                ResourceKey::Alias(ResourceAlias::Page { range, .. }) => {
                    let ids: Vec<u32> = (0..10u32)
                        .skip(range.offset)
                        .take(range.limit)
                        .collect();
                    let end = ids.len() < range.limit;
                    return Ok(Loaded::page(
                        ids.into_iter().map(|id| (id, id * 10 + call)).collect(),
                        end,
                    ));
                }
                other => other.ids(),
            };
            Ok(Loaded::many(
                ids.into_iter().map(|id| (id, id * 10 + call)).collect(),
            ))
        }
    }

    /// Blocks inside `load` until a permit is released.
    struct GatedLoader {
        entered: Notify,
        release: Semaphore,
    }

    impl GatedLoader {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                entered: Notify::new(),
                release: Semaphore::new(0),
            })
        }
    }

    #[async_trait]
    impl MapLoader<u32, &'static str> for GatedLoader {
        async fn load(
            &self,
            key: &ResourceKey<u32>,
        ) -> Result<Loaded<u32, &'static str>, CoreError> {
            self.entered.notify_one();
            self.release.acquire().await.unwrap().forget();
            Ok(Loaded::many(key.ids().into_iter().map(|id| (id, "loaded")).collect()))
        }
    }

    fn counting() -> (Arc<CountingLoader>, CachedMapResource<u32, u32>) {
        let loader = Arc::new(CountingLoader::default());
        let resource: CachedMapResource<u32, u32> =
            CachedMapResource::new("counting", loader.clone());
        (loader, resource)
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_call() {
        let (loader, resource) = counting();
        let key = ResourceKey::Key(1);

        let (a, b) = tokio::join!(resource.load(&key), resource.load(&key));

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*a.unwrap()[0], 11);
        assert_eq!(*b.unwrap()[0], 11);
    }

    #[tokio::test]
    async fn fresh_data_is_served_from_cache() {
        let (loader, resource) = counting();
        resource.load(&ResourceKey::Key(1)).await.unwrap();
        resource.load(&ResourceKey::Key(1)).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outdated_key_reloads_while_stale_value_stays_readable() {
        let (loader, resource) = counting();
        let key = ResourceKey::Key(2);
        resource.load(&key).await.unwrap();

        resource.mark_outdated(&key);
        assert!(resource.is_outdated(&key));
        assert_eq!(*resource.get(&2).unwrap(), 21);

        let reloaded = resource.load(&key).await.unwrap();
        assert_eq!(*reloaded[0], 22);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert!(!resource.is_outdated(&key));
    }

    #[tokio::test]
    async fn mark_updated_skips_reload() {
        let (loader, resource) = counting();
        let key = ResourceKey::Key(4);
        resource.load(&key).await.unwrap();
        resource.mark_outdated(&key);
        resource.mark_updated(&key);
        resource.load(&key).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_load_fetches_only_missing_ids() {
        let (loader, resource) = counting();
        resource.load(&ResourceKey::Key(1)).await.unwrap();

        let values = resource
            .load(&ResourceKey::List(vec![1, 2]))
            .await
            .unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(*values[0], 11, "cached id not reloaded");
        assert_eq!(*values[1], 22);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_is_wrapped_recorded_and_not_retried_automatically() {
        let (loader, resource) = counting();
        loader.fail.store(true, Ordering::SeqCst);
        let key = ResourceKey::Key(5);

        let err = resource.load(&key).await.unwrap_err();
        match &err {
            CoreError::Load { resource: name, key, .. } => {
                assert_eq!(*name, "counting");
                assert_eq!(key, "5");
            }
            other => panic!("expected Load error, got {other:?}"),
        }
        assert!(err.is_network());
        assert!(resource.error_of(&key).unwrap().is_network());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        loader.fail.store(false, Ordering::SeqCst);
        resource.load(&key).await.unwrap();
        assert!(resource.error_of(&key).is_none());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_alias_prunes_ids_the_server_dropped() {
        let (_loader, resource) = counting();
        resource.set(99, 0);

        let values = resource.load(&ResourceKey::all()).await.unwrap();

        assert_eq!(values.len(), 3);
        assert!(!resource.has(&99));
        assert_eq!(resource.resolve(&ResourceKey::all()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn pages_track_progress_and_end() {
        let (_loader, resource) = counting();

        resource.load_page(0, PageRange::new(0, 4)).await.unwrap();
        let state = resource.page_state(Some(&0));
        assert!(state.loaded);
        assert_eq!(state.next_offset, 4);
        assert!(!state.end_reached);

        resource.load_page(0, PageRange::new(8, 4)).await.unwrap();
        let state = resource.page_state(Some(&0));
        assert_eq!(state.next_offset, 12);
        assert!(state.end_reached);

        // A fresh first page forgets later windows.
        resource.refresh(&ResourceKey::page(0, PageRange::new(0, 4))).await.unwrap();
        let state = resource.page_state(Some(&0));
        assert_eq!(state.next_offset, 4);
        assert!(!state.end_reached);
    }

    #[tokio::test]
    async fn outdating_a_target_outdates_its_pages() {
        let (loader, resource) = counting();
        let page = ResourceKey::page(7, PageRange::first(2));
        resource.load(&page).await.unwrap();

        resource.mark_outdated(&ResourceKey::Key(7));
        assert!(resource.page_state(Some(&7)).outdated);

        resource.load(&page).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_finishing_after_clear_is_discarded() {
        let loader = GatedLoader::new();
        let resource: CachedMapResource<u32, &'static str> =
            CachedMapResource::new("gated", loader.clone());

        let task = tokio::spawn({
            let resource = resource.clone();
            async move { resource.load(&ResourceKey::Key(1)).await }
        });
        loader.entered.notified().await;

        resource.clear();
        loader.release.add_permits(1);

        let values = task.await.unwrap().unwrap();
        assert!(values.is_empty());
        assert!(!resource.has(&1));
    }

    #[tokio::test]
    async fn load_finishing_after_delete_does_not_resurrect_id() {
        let loader = GatedLoader::new();
        let resource: CachedMapResource<u32, &'static str> =
            CachedMapResource::new("gated", loader.clone());
        resource.set(1, "old");
        resource.mark_outdated(&ResourceKey::Key(1));

        let task = tokio::spawn({
            let resource = resource.clone();
            async move { resource.load(&ResourceKey::List(vec![1, 2])).await }
        });
        loader.entered.notified().await;

        resource.delete(&ResourceKey::Key(1));
        loader.release.add_permits(1);

        task.await.unwrap().unwrap();
        assert!(!resource.has(&1));
        assert_eq!(resource.get(&2).as_deref(), Some(&"loaded"));
    }

    #[tokio::test]
    async fn load_after_clear_does_not_join_discarded_flight() {
        let loader = GatedLoader::new();
        let resource: CachedMapResource<u32, &'static str> =
            CachedMapResource::new("gated", loader.clone());

        let stale = tokio::spawn({
            let resource = resource.clone();
            async move { resource.load(&ResourceKey::Key(1)).await }
        });
        loader.entered.notified().await;
        resource.clear();

        let fresh = tokio::spawn({
            let resource = resource.clone();
            async move { resource.load(&ResourceKey::Key(1)).await }
        });
        loader.entered.notified().await;
        loader.release.add_permits(2);

        stale.await.unwrap().unwrap();
        let values = fresh.await.unwrap().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(resource.get(&1).as_deref(), Some(&"loaded"));
    }

    #[tokio::test]
    async fn load_one_after_delete_starts_a_new_flight() {
        let loader = GatedLoader::new();
        let resource: CachedMapResource<u32, &'static str> =
            CachedMapResource::new("gated", loader.clone());

        let stale = tokio::spawn({
            let resource = resource.clone();
            async move { resource.load(&ResourceKey::Key(1)).await }
        });
        loader.entered.notified().await;
        resource.delete(&ResourceKey::Key(1));

        let fresh = tokio::spawn({
            let resource = resource.clone();
            async move { resource.load_one(&1).await }
        });
        loader.entered.notified().await;
        loader.release.add_permits(2);

        stale.await.unwrap().unwrap();
        assert_eq!(*fresh.await.unwrap().unwrap(), "loaded");
        assert!(resource.has(&1));
    }

    #[tokio::test]
    async fn failed_reload_keeps_stale_value_and_records_error() {
        let (loader, resource) = counting();
        let key = ResourceKey::Key(3);
        resource.load(&key).await.unwrap();
        resource.mark_outdated(&key);

        loader.fail.store(true, Ordering::SeqCst);
        assert!(resource.load(&key).await.is_err());

        assert_eq!(*resource.get(&3).unwrap(), 31);
        assert!(resource.is_outdated(&key));
        assert!(resource.error_of(&key).unwrap().is_network());
    }

    #[tokio::test]
    async fn mutations_publish_events() {
        let (_loader, resource) = counting();
        let mut rx = resource.subscribe();
        let before = resource.version();

        resource.set(1, 5);
        resource.mark_outdated(&ResourceKey::Key(1));
        resource.delete(&ResourceKey::Key(1));
        resource.clear();

        assert_eq!(rx.recv().await.unwrap(), ResourceEvent::ItemUpdate(ResourceKey::Key(1)));
        assert_eq!(rx.recv().await.unwrap(), ResourceEvent::DataOutdated(ResourceKey::Key(1)));
        assert_eq!(rx.recv().await.unwrap(), ResourceEvent::ItemDelete(ResourceKey::Key(1)));
        assert_eq!(rx.recv().await.unwrap(), ResourceEvent::Cleared);
        assert_eq!(resource.version(), before + 4);
    }

    #[tokio::test]
    async fn update_rewrites_cached_value() {
        let (_loader, resource) = counting();
        assert!(resource.update(&1, |v| v + 1).is_none());
        resource.set(1, 5);
        assert_eq!(*resource.update(&1, |v| v + 1).unwrap(), 6);
    }

    #[tokio::test]
    async fn load_one_returns_loaded_entity() {
        let loader = GatedLoader::new();
        loader.release.add_permits(1);
        let resource: CachedMapResource<u32, &'static str> =
            CachedMapResource::new("gated", loader.clone());
        assert_eq!(*resource.load_one(&3).await.unwrap(), "loaded");
    }
}
