use async_trait::async_trait;
use serde_json::{Map, Value};
use store::{MemoryStore, RecordStore, StoreError, Version, Versioned};

/// Memory store whose conditional writes always lose the race.
pub struct ConflictingStore {
    inner: MemoryStore,
}

impl ConflictingStore {
    pub fn new(root: Value) -> Self {
        Self {
            inner: MemoryStore::with_root(root),
        }
    }
}

#[async_trait]
impl RecordStore for ConflictingStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        self.inner.update(path, fields).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.inner.delete(path).await
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        self.inner.push(path, value).await
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, StoreError> {
        self.inner.get_versioned(path).await
    }

    async fn set_if(&self, _: &str, _: &Value, _: &Version) -> Result<bool, StoreError> {
        Ok(false)
    }
}
