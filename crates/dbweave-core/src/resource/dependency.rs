// ── Dependency wiring between resources ──
//
// A small reactive graph: when resource A changes, dependents are marked
// outdated, cleared, or have matching keys removed. Listeners run
// synchronously on the thread that mutated A, so propagation is transitive
// and complete by the time the mutating call returns. A resource that is
// already notifying on the current thread does not notify again, which
// terminates cycles.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tracing::trace;

use super::key::{ResourceAlias, ResourceId, ResourceKey};
use super::map::{CachedMapResource, MapInner, ResourceEvent};

pub(crate) type Listener<K> = Arc<dyn Fn(&ResourceEvent<K>) + Send + Sync>;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static NOTIFYING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Pops the resource id off the notifying stack, even on unwind.
struct NotifyGuard(u64);

impl Drop for NotifyGuard {
    fn drop(&mut self) {
        NOTIFYING.with(|stack| stack.borrow_mut().retain(|id| *id != self.0));
    }
}

/// Run every listener for `event` unless `resource` is already notifying
/// further up this thread's stack.
pub(crate) fn notify<K>(
    resource: u64,
    name: &'static str,
    listeners: &ArcSwap<Vec<Listener<K>>>,
    event: &ResourceEvent<K>,
) {
    let reentrant = NOTIFYING.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.contains(&resource) {
            true
        } else {
            stack.push(resource);
            false
        }
    });
    if reentrant {
        trace!(resource = name, "dependency cycle reached, stopping propagation");
        return;
    }
    let _guard = NotifyGuard(resource);

    // Snapshot so listeners registered mid-notification wait for the next event.
    let listeners = listeners.load_full();
    for listener in listeners.iter() {
        listener(event);
    }
}

// ── Type-erased handle ───────────────────────────────────────────────

/// Operations a resource exposes to the resources that depend on it.
pub trait ResourceHandle: Send + Sync {
    fn name(&self) -> &'static str;
    /// Mark everything stale.
    fn outdate_all(&self);
    /// Drop everything.
    fn clear_all(&self);
}

impl<K: ResourceId, V: Send + Sync + 'static> ResourceHandle for MapInner<K, V> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn outdate_all(&self) {
        self.mark_outdated(&ResourceKey::all());
    }

    fn clear_all(&self) {
        self.clear();
    }
}

/// Anything that can be the target of `outdate_resource` or `connect`.
pub trait Dependent {
    fn handle(&self) -> Weak<dyn ResourceHandle>;
}

impl<K: ResourceId, V: Send + Sync + 'static> Dependent for CachedMapResource<K, V> {
    fn handle(&self) -> Weak<dyn ResourceHandle> {
        let weak: Weak<MapInner<K, V>> = Arc::downgrade(&self.inner);
        weak
    }
}

// ── Wiring ───────────────────────────────────────────────────────────

impl<K: ResourceId, V: Send + Sync + 'static> CachedMapResource<K, V> {
    /// Register a synchronous listener for every event this resource emits.
    pub fn on_event(&self, listener: impl Fn(&ResourceEvent<K>) + Send + Sync + 'static) {
        let listener: Listener<K> = Arc::new(listener);
        self.inner.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&listener));
            next
        });
    }

    /// Whenever this resource goes stale, `dependent` goes stale too.
    pub fn outdate_resource(&self, dependent: &impl Dependent) {
        let target = dependent.handle();
        let source = self.inner.name;
        self.on_event(move |event| {
            if let ResourceEvent::DataOutdated(_) = event {
                if let Some(target) = target.upgrade() {
                    trace!(source, target = target.name(), "outdating dependent");
                    target.outdate_all();
                }
            }
        });
    }

    /// Whenever this resource is cleared, `dependent` is cleared too.
    pub fn connect(&self, dependent: &impl Dependent) {
        let target = dependent.handle();
        let source = self.inner.name;
        self.on_event(move |event| {
            if let ResourceEvent::Cleared = event {
                if let Some(target) = target.upgrade() {
                    trace!(source, target = target.name(), "clearing connected resource");
                    target.clear_all();
                }
            }
        });
    }

    /// Mirror item changes onto `dependent`: updated items mark the mapped
    /// keys outdated, deleted items delete them, clearing clears.
    pub fn sync<K2, V2, F>(&self, dependent: &CachedMapResource<K2, V2>, map: F)
    where
        K2: ResourceId,
        V2: Send + Sync + 'static,
        F: Fn(&K) -> Option<K2> + Send + Sync + 'static,
    {
        let target = Arc::downgrade(&dependent.inner);
        self.on_event(move |event| {
            let Some(inner) = target.upgrade() else {
                return;
            };
            let target = CachedMapResource { inner };
            match event {
                ResourceEvent::ItemUpdate(key) => {
                    if let Some(mapped) = map_key(key, &map) {
                        target.mark_outdated(&mapped);
                    }
                }
                ResourceEvent::ItemDelete(key) => {
                    if let Some(mapped) = map_key(key, &map) {
                        target.delete(&mapped);
                    }
                }
                ResourceEvent::Cleared => target.clear(),
                ResourceEvent::DataUpdate(_) | ResourceEvent::DataOutdated(_) => {}
            }
        });
    }

    /// Like [`sync`](Self::sync) but only deletions and clears propagate.
    pub fn cascade_delete<K2, V2, F>(&self, dependent: &CachedMapResource<K2, V2>, map: F)
    where
        K2: ResourceId,
        V2: Send + Sync + 'static,
        F: Fn(&K) -> Option<K2> + Send + Sync + 'static,
    {
        let target = Arc::downgrade(&dependent.inner);
        self.on_event(move |event| {
            let Some(inner) = target.upgrade() else {
                return;
            };
            let target = CachedMapResource { inner };
            match event {
                ResourceEvent::ItemDelete(key) => {
                    if let Some(mapped) = map_key(key, &map) {
                        target.delete(&mapped);
                    }
                }
                ResourceEvent::Cleared => target.clear(),
                _ => {}
            }
        });
    }
}

/// Translate a key of one resource into the key space of another.
fn map_key<K, K2>(key: &ResourceKey<K>, map: &impl Fn(&K) -> Option<K2>) -> Option<ResourceKey<K2>>
where
    K: ResourceId,
    K2: ResourceId,
{
    match key {
        ResourceKey::Alias(ResourceAlias::All) => Some(ResourceKey::all()),
        ResourceKey::Alias(ResourceAlias::Page { target, .. }) => {
            target.as_ref().and_then(map).map(ResourceKey::Key)
        }
        ResourceKey::Key(_) | ResourceKey::List(_) => {
            let ids: Vec<K2> = key.ids().iter().filter_map(map).collect();
            (!ids.is_empty()).then(|| ResourceKey::from_ids(ids))
        }
    }
}
