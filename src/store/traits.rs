//! The object store seam

use async_trait::async_trait;

/// Append-only view of an object store
///
/// Paths are `/`-separated and relative to the store root. Implementations
/// create missing parent directories implicitly.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Append `data` to the file at `path`, creating the file if it is absent
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) when the store refuses
    /// the write, or [`Error::Network`](crate::Error::Network) when it cannot be
    /// reached.
    async fn append(&self, path: &str, data: &[u8]) -> crate::Result<()>;

    /// Names of the entries directly under `path` (`""` or `"."` for the root)
    async fn list(&self, path: &str) -> crate::Result<Vec<String>>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}
