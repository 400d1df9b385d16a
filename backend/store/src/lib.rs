//! # Store
//!
//! Hierarchical JSON document store, addressed by slash separated paths.
//!
//! ## Backends
//!
//! - [`FirebaseStore`]: Realtime Database REST API, one HTTP call per operation
//! - [`MemoryStore`]: in-process tree with the same semantics, for local runs and tests
//!
//! ## Semantics
//!
//! - Writing `null` removes a node, empty objects disappear
//! - `update` merges the given keys and leaves the rest alone
//! - `push` appends a child under a generated key, keys sort in insertion order
//! - Collections keyed by small integers may come back as JSON arrays, see [`children`]
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod credentials;
pub mod memory;
pub mod remote;

pub use credentials::{Credentials, ServiceAccount};
pub use memory::MemoryStore;
pub use remote::FirebaseStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("credentials rejected: {0}")]
    Credentials(String),

    #[error("gave up after {0} conflicting writes")]
    Contention(usize),
}

/// Opaque token identifying the value returned by a versioned read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version(pub String);

#[derive(Debug, Clone)]
pub struct Versioned {
    pub value: Option<Value>,
    pub version: Version,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError>;

    /// Merges `fields` into the node at `path`. Keys absent from `fields` keep their values.
    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Appends `value` under a generated child key and returns that key.
    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError>;

    async fn get_versioned(&self, path: &str) -> Result<Versioned, StoreError>;

    /// Writes only if the node still matches `version`. Returns `false` on a conflict.
    async fn set_if(&self, path: &str, value: &Value, version: &Version)
    -> Result<bool, StoreError>;
}

/// Splits a path into its non-empty segments, so `/`, `""` and `//` are all the root.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical form: no leading or trailing slash, root is `""`.
pub fn normalize(path: &str) -> String {
    segments(path).join("/")
}

pub fn join(parent: &str, child: &str) -> String {
    let mut parts = segments(parent);
    parts.extend(segments(child));
    parts.join("/")
}

/// Children of a collection node as `(key, value)` pairs.
///
/// Firebase turns objects whose keys are mostly sequential integers into arrays,
/// so arrays are read as `index -> element` with `null` holes skipped.
pub fn children(node: &Value) -> Vec<(String, &Value)> {
    match node {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}
