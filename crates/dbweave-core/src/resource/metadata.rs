// ── Per-key load metadata ──

use std::sync::Arc;

use crate::error::CoreError;

/// Load bookkeeping for one key or alias.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// A load completed and its data is in the cache.
    pub loaded: bool,
    /// Data is stale; the next `load` refetches it while the old value
    /// stays readable.
    pub outdated: bool,
    /// Last page alias reported fewer entries than requested.
    pub end_reached: bool,
    /// Failure of the most recent load, cleared by the next success.
    pub error: Option<Arc<CoreError>>,
}

impl Metadata {
    pub(crate) fn loaded(end_reached: bool) -> Self {
        Self {
            loaded: true,
            outdated: false,
            end_reached,
            error: None,
        }
    }

    pub(crate) fn failed(error: Arc<CoreError>) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Whether `load` must hit the loader.
    pub fn needs_load(&self) -> bool {
        !self.loaded || self.outdated
    }
}
