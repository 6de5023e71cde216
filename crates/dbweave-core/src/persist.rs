// ── Persisted client state ──
//
// Named JSON blobs that outlive the process: wizard progress and session
// settings. `dbweave-config` provides a file-backed store; tests and
// ephemeral clients use `MemoryStateStore`.

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::CoreError;

/// Key-value storage for JSON blobs.
pub trait StateStore: Send + Sync + 'static {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoreError>;
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Read `key` as `T`. Missing or malformed blobs yield `T::default()`;
/// malformed ones are logged.
pub fn load_or_default<T>(store: &dyn StateStore, key: &str) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    let Some(value) = store.load(key)? else {
        return Ok(T::default());
    };
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!(key, error = %e, "ignoring malformed persisted state");
            Ok(T::default())
        }
    }
}

pub fn save_as<T: Serialize>(store: &dyn StateStore, key: &str, value: &T) -> Result<(), CoreError> {
    let value = serde_json::to_value(value).map_err(|e| CoreError::Internal(e.to_string()))?;
    store.save(key, &value)
}

/// Process-local [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: DashMap<String, serde_json::Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Progress {
        steps: Vec<String>,
    }

    #[test]
    fn missing_and_malformed_blobs_default() {
        let store = MemoryStateStore::new();
        let missing: Progress = load_or_default(&store, "progress").unwrap();
        assert_eq!(missing, Progress::default());

        store.save("progress", &serde_json::json!("garbage")).unwrap();
        let malformed: Progress = load_or_default(&store, "progress").unwrap();
        assert_eq!(malformed, Progress::default());
    }

    #[test]
    fn saved_blob_reads_back() {
        let store = MemoryStateStore::new();
        let progress = Progress {
            steps: vec!["welcome".into()],
        };
        save_as(&store, "progress", &progress).unwrap();
        assert_eq!(load_or_default::<Progress>(&store, "progress").unwrap(), progress);

        store.remove("progress").unwrap();
        assert!(store.load("progress").unwrap().is_none());
    }
}
