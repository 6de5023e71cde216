// ── Reactive resource streams ──
//
// Pull-style subscription to a resource: the `watch` version counter says
// *that* something changed, the snapshot says *what* it looks like now.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::key::ResourceId;
use super::map::CachedMapResource;

/// A subscription to every entity in a resource.
///
/// Provides both point-in-time snapshot access and change notification via
/// [`changed()`](Self::changed) or by converting to a `Stream`.
pub struct ResourceStream<K: ResourceId, V: Send + Sync + 'static> {
    resource: CachedMapResource<K, V>,
    current: Vec<(K, Arc<V>)>,
    receiver: watch::Receiver<u64>,
}

impl<K: ResourceId, V: Send + Sync + 'static> ResourceStream<K, V> {
    pub fn new(resource: &CachedMapResource<K, V>) -> Self {
        let mut receiver = resource.watch_version();
        receiver.mark_unchanged();
        Self {
            current: resource.snapshot(),
            resource: resource.clone(),
            receiver,
        }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &[(K, Arc<V>)] {
        &self.current
    }

    /// Snapshot right now, which may be newer than `current()`.
    pub fn latest(&self) -> Vec<(K, Arc<V>)> {
        self.resource.snapshot()
    }

    /// Wait for the next mutation and return the new snapshot.
    /// Returns `None` if the resource has been dropped.
    pub async fn changed(&mut self) -> Option<&[(K, Arc<V>)]> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update();
        self.current = self.resource.snapshot();
        Some(&self.current)
    }

    /// Convert into a `Stream` of version numbers.
    pub fn into_stream(self) -> VersionStream {
        VersionStream {
            inner: WatchStream::from_changes(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a resource's version `watch::Receiver`.
///
/// Yields the new version each time the resource is mutated.
pub struct VersionStream {
    inner: WatchStream<u64>,
}

impl Stream for VersionStream {
    type Item = u64;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
