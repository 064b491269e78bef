//! In-process store for dry runs

use super::traits::ObjectStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Object store kept in memory
///
/// Clones share the same contents, so a clone handed to the extraction loop can
/// be inspected from outside.
///
/// ```
/// use weather_extract::store::{MemoryStore, ObjectStore};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.append("raw/a.json", b"{}").await?;
/// store.append("raw/a.json", b"{}").await?;
/// assert_eq!(store.read("raw/a.json").as_deref(), Some(&b"{}{}"[..]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All bytes appended to `path` so far
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().get(normalize(path)).cloned()
    }

    /// Every path written, in lexical order
    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn append(&self, path: &str, data: &[u8]) -> crate::Result<()> {
        self.lock()
            .entry(normalize(path).to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    async fn list(&self, path: &str) -> crate::Result<Vec<String>> {
        let dir = normalize(path);
        let prefix = if dir.is_empty() || dir == "." {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let mut names: Vec<String> = self
            .lock()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        names.dedup();
        Ok(names)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
