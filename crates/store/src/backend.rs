//! Storage backends.

use std::collections::HashMap;
use std::sync::Mutex;

/// Raw string-keyed storage.
///
/// Object-safe so the session layer can hold `Arc<dyn StoreBackend>` and
/// tests can swap the file backend for memory. Implementations must be
/// usable from multiple threads.
pub trait StoreBackend: Send + Sync {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
    fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// Process-local backend with no persistence.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.entries().clear();
        Ok(())
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_basic_semantics() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read("k").unwrap(), None);

        backend.write("k", "v").unwrap();
        assert_eq!(backend.read("k").unwrap(), Some("v".into()));

        backend.write("k", "v2").unwrap();
        assert_eq!(backend.read("k").unwrap(), Some("v2".into()));

        backend.delete("k").unwrap();
        assert_eq!(backend.read("k").unwrap(), None);
        // Deleting an absent key is a no-op.
        backend.delete("k").unwrap();
    }

    #[test]
    fn keys_are_sorted() {
        let backend = MemoryBackend::new();
        backend.write("b", "2").unwrap();
        backend.write("a", "1").unwrap();
        backend.write("c", "3").unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["a", "b", "c"]);

        backend.clear().unwrap();
        assert!(backend.keys().unwrap().is_empty());
    }
}
