//! Object storage for archived payloads
//!
//! The core abstraction is the [`ObjectStore`] trait, an append-only view of a
//! file store. Two implementations are provided:
//!
//! - [`AdlsStore`]: Azure Data Lake Store Gen1 through its WebHDFS REST API
//! - [`MemoryStore`]: in-process map for dry runs and tests
//!
//! [`write_json_file`] is the fail-soft write used by the extraction loop. It
//! accepts a possibly missing connection and never returns an error; the
//! outcome is reported as a [`WriteStatus`] instead.

mod adls;
mod memory;
mod traits;

pub use adls::AdlsStore;
pub use memory::MemoryStore;
pub use traits::ObjectStore;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{error, info};

/// Outcome of a single archive write
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// The payload was appended to `path`
    Written {
        /// Store path written
        path: String,
        /// Number of bytes appended
        bytes: usize,
    },
    /// Nothing was written
    Failed {
        /// Store path the write targeted
        path: String,
        /// Why the write did not happen
        reason: String,
    },
}

impl WriteStatus {
    /// Whether the payload reached the store
    pub fn is_written(&self) -> bool {
        matches!(self, WriteStatus::Written { .. })
    }

    /// Store path the write targeted
    pub fn path(&self) -> &str {
        match self {
            WriteStatus::Written { path, .. } | WriteStatus::Failed { path, .. } => path,
        }
    }
}

impl std::fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStatus::Written { bytes, .. } => write!(f, "wrote {} bytes", bytes),
            WriteStatus::Failed { reason, .. } => write!(f, "unable to write: {}", reason),
        }
    }
}

/// Render a response body as the archived JSON document
///
/// A body that parses as JSON is re-emitted with keys sorted at every level and
/// four-space indentation; numbers keep their exact upstream text. Anything
/// else (HTML error pages, truncated bodies) is archived as a JSON string
/// literal, so the upstream text is kept verbatim.
pub fn serialize_payload(body: &str) -> crate::Result<Vec<u8>> {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => sort_keys(parsed),
        Err(_) => Value::String(body.to_string()),
    };

    let mut out = Vec::with_capacity(body.len() + body.len() / 2);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

// serde_json keeps insertion order when `preserve_order` is enabled anywhere
// in the build, so objects are rebuilt in key order explicitly
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Serialize `body` and append it to `path`
///
/// A missing store (the connection sentinel) fails immediately without any
/// I/O. Serialization and store errors are logged and folded into
/// [`WriteStatus::Failed`].
pub async fn write_json_file(
    store: Option<&dyn ObjectStore>,
    path: &str,
    body: &str,
) -> WriteStatus {
    let Some(store) = store else {
        error!(path, "No store connection, skipping write");
        return WriteStatus::Failed {
            path: path.to_string(),
            reason: "no store connection".to_string(),
        };
    };

    let bytes = match serialize_payload(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(path, error = %e, "Failed to serialize payload");
            return WriteStatus::Failed {
                path: path.to_string(),
                reason: e.to_string(),
            };
        }
    };

    match store.append(path, &bytes).await {
        Ok(()) => {
            info!(store = store.name(), path, bytes = bytes.len(), "Wrote payload to store");
            WriteStatus::Written {
                path: path.to_string(),
                bytes: bytes.len(),
            }
        }
        Err(e) => {
            error!(
                store = store.name(),
                path,
                error = %e,
                code = e.error_code(),
                "Error while writing payload to store"
            );
            WriteStatus::Failed {
                path: path.to_string(),
                reason: e.to_string(),
            }
        }
    }
}
