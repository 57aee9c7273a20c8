//! File-backed storage under the OS app-data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;

use crate::backend::StoreBackend;

/// Single-file JSON backend: the whole store is one flat object at
/// `{app_data_dir}/milvault/session.json`, loaded on open and written
/// through on every mutation.
///
/// Writes are immediately visible to anything else reading the same file;
/// there is no cross-process change notification.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    /// Open the backend at the default per-user location.
    pub fn open() -> anyhow::Result<Self> {
        Self::open_at(session_file_path()?)
    }

    /// Open the backend at an explicit path (tests, portable installs).
    pub fn open_at(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory at {:?}", parent))?;
        }

        let entries = load_entries(&path);
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        let payload = serde_json::to_string_pretty(entries)
            .context("failed to serialize session store")?;
        std::fs::write(&self.path, payload)
            .with_context(|| format!("failed to write session store at {:?}", self.path))
    }
}

impl StoreBackend for FileBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut entries = self.entries();
        entries.clear();
        self.persist(&entries)
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Read the store file, tolerating absence and corruption.
///
/// An unreadable or unparseable file starts the session empty rather than
/// failing open; the store contract is loss-tolerant.
fn load_entries(path: &Path) -> HashMap<String, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(err) => {
            tracing::error!(?path, "failed to read session store: {err}");
            return HashMap::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(?path, "session store is corrupt, starting empty: {err}");
            HashMap::new()
        }
    }
}

/// Resolve the path to the session store file:
/// `{app_data_dir}/milvault/session.json`.
fn session_file_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut path = base;
    path.push("milvault");
    path.push("session.json");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        (dir, path)
    }

    #[test]
    fn values_survive_reopen() {
        let (_dir, path) = temp_store();

        {
            let backend = FileBackend::open_at(&path).unwrap();
            backend.write("auth_token", "tok-1").unwrap();
            backend.write("current_user", r#"{"id":"u1"}"#).unwrap();
        }

        let backend = FileBackend::open_at(&path).unwrap();
        assert_eq!(backend.read("auth_token").unwrap(), Some("tok-1".into()));
        assert_eq!(
            backend.read("current_user").unwrap(),
            Some(r#"{"id":"u1"}"#.into())
        );
    }

    #[test]
    fn deletes_survive_reopen() {
        let (_dir, path) = temp_store();

        {
            let backend = FileBackend::open_at(&path).unwrap();
            backend.write("a", "1").unwrap();
            backend.write("b", "2").unwrap();
            backend.delete("a").unwrap();
        }

        let backend = FileBackend::open_at(&path).unwrap();
        assert_eq!(backend.read("a").unwrap(), None);
        assert_eq!(backend.read("b").unwrap(), Some("2".into()));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let (_dir, path) = temp_store();
        std::fs::write(&path, "{ not json").unwrap();

        let backend = FileBackend::open_at(&path).unwrap();
        assert_eq!(backend.read("anything").unwrap(), None);

        // And the store is usable again after the first write.
        backend.write("k", "v").unwrap();
        let reopened = FileBackend::open_at(&path).unwrap();
        assert_eq!(reopened.read("k").unwrap(), Some("v".into()));
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("session.json");
        let backend = FileBackend::open_at(&path).unwrap();
        backend.write("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn clear_empties_the_file() {
        let (_dir, path) = temp_store();

        let backend = FileBackend::open_at(&path).unwrap();
        backend.write("a", "1").unwrap();
        backend.clear().unwrap();

        let reopened = FileBackend::open_at(&path).unwrap();
        assert!(reopened.keys().unwrap().is_empty());
    }
}
