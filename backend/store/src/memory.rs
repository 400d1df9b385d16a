use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::{RecordStore, StoreError, Version, Versioned, join, segments};

/// In-process tree following the database's write rules.
#[derive(Default)]
pub struct MemoryStore {
    root: RwLock<Value>,
    next_push: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing tree, e.g. a database export.
    pub fn with_root(root: Value) -> Self {
        Self {
            root: RwLock::new(prune(root)),
            next_push: AtomicU64::new(0),
        }
    }

    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    async fn read(&self, path: &str) -> Option<Value> {
        let root = self.root.read().await;

        lookup(&root, &segments(path))
            .filter(|node| !is_vacant(node))
            .cloned()
    }
}

fn lookup<'a>(node: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(node, |current, key| current.as_object()?.get(*key))
}

fn is_vacant(node: &Value) -> bool {
    node.is_null() || node.as_object().is_some_and(Map::is_empty)
}

fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, prune(child)))
                .filter(|(_, child)| !is_vacant(child))
                .collect();

            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn write(node: &mut Value, path: &[&str], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let Value::Object(map) = node else {
        return;
    };

    let child = map.entry(first.to_string()).or_insert(Value::Null);
    write(child, rest, value);

    if is_vacant(child) {
        map.remove(*first);
    }
}

fn version_of(node: Option<&Value>) -> Version {
    Version(node.unwrap_or(&Value::Null).to_string())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read(path).await)
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let mut root = self.root.write().await;
        write(&mut root, &segments(path), prune(value.clone()));

        Ok(())
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let mut root = self.root.write().await;

        for (key, value) in fields {
            let target = join(path, key);
            write(&mut root, &segments(&target), prune(value.clone()));
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut root = self.root.write().await;
        write(&mut root, &segments(path), Value::Null);

        Ok(())
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, StoreError> {
        let key = format!("-M{:018}", self.next_push.fetch_add(1, Ordering::SeqCst));
        self.set(&join(path, &key), value).await?;

        Ok(key)
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, StoreError> {
        let root = self.root.read().await;
        let node = lookup(&root, &segments(path)).filter(|node| !is_vacant(node));

        Ok(Versioned {
            value: node.cloned(),
            version: version_of(node),
        })
    }

    async fn set_if(
        &self,
        path: &str,
        value: &Value,
        version: &Version,
    ) -> Result<bool, StoreError> {
        let mut root = self.root.write().await;
        let path = segments(path);

        let current = lookup(&root, &path).filter(|node| !is_vacant(node));
        if version_of(current) != *version {
            return Ok(false);
        }

        write(&mut root, &path, prune(value.clone()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::MemoryStore;
    use crate::{RecordStore, Version};

    #[tokio::test]
    async fn test_set_and_get_nested() {
        let store = MemoryStore::new();
        store.set("/chat/log/1", &json!({"id": 1, "role": "user"})).await.unwrap();

        assert_eq!(store.get("chat/log/1/role").await.unwrap(), Some(json!("user")));
        assert!(store.get("/chat/log/2").await.unwrap().is_none());
        assert!(store.get("/chat/log/1/role/deeper").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_root_reads_as_none() {
        let store = MemoryStore::new();
        assert!(store.get("/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_parents() {
        let store = MemoryStore::new();
        store.set("/info/log/1", &json!({"id": 1})).await.unwrap();
        store.set("/info/last_user_id", &json!(1)).await.unwrap();

        store.delete("/info/log/1").await.unwrap();

        assert_eq!(store.snapshot().await, json!({"info": {"last_user_id": 1}}));
    }

    #[tokio::test]
    async fn test_delete_missing_path_keeps_scalars() {
        let store = MemoryStore::new();
        store.set("/current_task_id", &json!(4)).await.unwrap();

        store.delete("/current_task_id/nothing").await.unwrap();

        assert_eq!(store.get("/current_task_id").await.unwrap(), Some(json!(4)));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        store
            .set("/1", &json!({"id": 1, "task": "buy milk", "status": "pending"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("done"));
        store.update("/1", &fields).await.unwrap();

        assert_eq!(
            store.get("/1").await.unwrap(),
            Some(json!({"id": 1, "task": "buy milk", "status": "done"}))
        );
    }

    #[tokio::test]
    async fn test_null_values_are_dropped() {
        let store = MemoryStore::new();
        store.set("/1", &json!({"id": 1, "note": null, "tags": {}})).await.unwrap();

        assert_eq!(store.get("/1").await.unwrap(), Some(json!({"id": 1})));

        store.set("/1", &json!(null)).await.unwrap();
        assert!(store.get("/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_keys_increase() {
        let store = MemoryStore::new();
        let first = store.push("/info/log", &json!({"id": 1})).await.unwrap();
        let second = store.push("/info/log", &json!({"id": 2})).await.unwrap();

        assert!(first < second);
        assert_eq!(
            store.get(&format!("/info/log/{second}/id")).await.unwrap(),
            Some(json!(2))
        );
    }

    #[tokio::test]
    async fn test_conditional_write() {
        let store = MemoryStore::with_root(json!({"current_task_id": 1}));

        let read = store.get_versioned("/current_task_id").await.unwrap();
        assert_eq!(read.value, Some(json!(1)));

        store.set("/current_task_id", &json!(2)).await.unwrap();
        assert!(!store.set_if("/current_task_id", &json!(2), &read.version).await.unwrap());

        let read = store.get_versioned("/current_task_id").await.unwrap();
        assert!(store.set_if("/current_task_id", &json!(3), &read.version).await.unwrap());
        assert_eq!(store.get("/current_task_id").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_conditional_create() {
        let store = MemoryStore::new();
        let absent = Version("null".to_string());

        assert!(store.set_if("/chat/last_message_id", &json!(2), &absent).await.unwrap());
        assert!(!store.set_if("/chat/last_message_id", &json!(4), &absent).await.unwrap());
    }
}
