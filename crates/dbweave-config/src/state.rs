// File-backed persisted client state.
//
// One JSON file per key under a state directory. Keys are restricted to a
// filename-safe alphabet so a key can never escape the directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use dbweave_core::{CoreError, StateStore};

/// A [`StateStore`] writing `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// The directory is created lazily on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(CoreError::ValidationFailed {
                message: format!("invalid state key: {key:?}"),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> CoreError {
    CoreError::Internal(format!("{}: {err}", path.display()))
}

impl StateStore for FileStateStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoreError> {
        let path = self.path_for(key)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, &e)),
        };
        // Malformed files are surfaced as a JSON string so callers can decide
        // to fall back to defaults instead of failing.
        Ok(Some(
            serde_json::from_str(&contents).unwrap_or(serde_json::Value::String(contents)),
        ))
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), CoreError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, &e))?;
        let body =
            serde_json::to_string_pretty(value).map_err(|e| CoreError::Internal(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(|e| io_error(&tmp, &e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, &e))?;
        debug!(key, path = %path.display(), "state saved");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, &e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));

        assert!(store.load("configuration_wizard").unwrap().is_none());
        store
            .save("configuration_wizard", &json!({ "finishedSteps": ["welcome"] }))
            .unwrap();
        assert_eq!(
            store.load("configuration_wizard").unwrap(),
            Some(json!({ "finishedSteps": ["welcome"] }))
        );
        assert!(dir.path().join("state/configuration_wizard.json").exists());

        store.remove("configuration_wizard").unwrap();
        store.remove("configuration_wizard").unwrap();
        assert!(store.load("configuration_wizard").unwrap().is_none());
    }

    #[test]
    fn rejects_keys_that_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        for key in ["../outside", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.save(key, &json!(1)),
                Err(CoreError::ValidationFailed { .. })
            ));
        }
    }

    #[test]
    fn malformed_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session_settings.json"), "{not json").unwrap();
        let store = FileStateStore::new(dir.path());

        let settings: dbweave_core::SessionSettings =
            dbweave_core::persist::load_or_default(&store, "session_settings").unwrap();
        assert_eq!(settings, dbweave_core::SessionSettings::default());
    }
}
