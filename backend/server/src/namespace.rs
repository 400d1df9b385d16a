//! # Namespaces
//!
//! One collection per subtree of the database.
//!
//! | Collection | Root | Counter | Records |
//! |---|---|---|---|
//! | tasks | `/` | `current_task_id` | root |
//! | chat | `/chat` | `last_message_id` | `log` |
//! | trips | `/info` | `last_user_id` | `log` |
//!
//! Tasks share their root with the counter, so anything walking the records has to
//! skip the counter key. Raw reads of the root keep it.
//!
//! ## Key modes
//!
//! - Keyed: record `n` lives at `<records>/n`, lookups are a single read
//! - Pushed: records sit under generated keys, lookups scan for the embedded `id`
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};
use store::{RecordStore, StoreError, children, join};

pub const TASK_COUNTER: &str = "current_task_id";
pub const CHAT_COUNTER: &str = "last_message_id";
pub const TRIP_COUNTER: &str = "last_user_id";

const CHAT_ROOT: &str = "/chat";
const TRIP_ROOT: &str = "/info";
const LOG: &str = "log";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyMode {
    #[default]
    Keyed,
    Pushed,
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyed" => Ok(Self::Keyed),
            "pushed" => Ok(Self::Pushed),
            other => Err(format!("unknown key mode {other}")),
        }
    }
}

/// A record found in the store, with the path it was found at.
#[derive(Debug)]
pub struct Located {
    pub path: String,
    pub value: Value,
}

#[derive(Clone, Debug)]
pub struct Namespace {
    root: String,
    counter_key: &'static str,
    records: &'static str,
    key_mode: KeyMode,
}

impl Namespace {
    pub fn tasks(root: &str, key_mode: KeyMode) -> Self {
        Self {
            root: root.to_string(),
            counter_key: TASK_COUNTER,
            records: "",
            key_mode,
        }
    }

    pub fn chat(key_mode: KeyMode) -> Self {
        Self {
            root: CHAT_ROOT.to_string(),
            counter_key: CHAT_COUNTER,
            records: LOG,
            key_mode,
        }
    }

    pub fn trips(key_mode: KeyMode) -> Self {
        Self {
            root: TRIP_ROOT.to_string(),
            counter_key: TRIP_COUNTER,
            records: LOG,
            key_mode,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn counter_key(&self) -> &str {
        self.counter_key
    }

    pub fn counter_path(&self) -> String {
        join(&self.root, self.counter_key)
    }

    pub fn records_path(&self) -> String {
        join(&self.root, self.records)
    }

    pub fn record_path(&self, id: u64) -> String {
        join(&self.records_path(), &id.to_string())
    }

    /// Every record with its key, counter excluded.
    pub async fn records(&self, store: &dyn RecordStore) -> Result<Vec<(String, Value)>, StoreError> {
        let Some(node) = store.get(&self.records_path()).await? else {
            return Ok(Vec::new());
        };

        Ok(children(&node)
            .into_iter()
            .filter(|(key, _)| key != self.counter_key)
            .map(|(key, value)| (key, value.clone()))
            .collect())
    }

    /// Ids of every record, see [`record_id`].
    pub async fn ids(&self, store: &dyn RecordStore) -> Result<Vec<u64>, StoreError> {
        Ok(self
            .records(store)
            .await?
            .iter()
            .filter_map(|(key, value)| record_id(key, value))
            .collect())
    }

    /// Writes a new record and returns its path. A placeholder left by [`Namespace::claim`]
    /// is replaced in place.
    pub async fn insert<T: Serialize + Sync>(
        &self,
        store: &dyn RecordStore,
        id: u64,
        record: &T,
    ) -> Result<String, StoreError> {
        let value = serde_json::to_value(record)?;

        match self.key_mode {
            KeyMode::Keyed => {
                let path = self.record_path(id);
                store.set(&path, &value).await?;
                Ok(path)
            }
            KeyMode::Pushed => {
                let claimed = self
                    .records(store)
                    .await?
                    .into_iter()
                    .find(|(_, existing)| *existing == placeholder(id));

                let path = match claimed {
                    Some((key, _)) => join(&self.records_path(), &key),
                    None => {
                        let key = store.push(&self.records_path(), &value).await?;
                        return Ok(join(&self.records_path(), &key));
                    }
                };

                store.set(&path, &value).await?;
                Ok(path)
            }
        }
    }

    /// Reserves the slot for `id` with a placeholder record so scans see the id before the
    /// real record lands. Returns the slot path, or `None` if the id is already held.
    pub async fn claim(&self, store: &dyn RecordStore, id: u64) -> Result<Option<String>, StoreError> {
        match self.key_mode {
            KeyMode::Keyed => {
                let path = self.record_path(id);
                let current = store.get_versioned(&path).await?;

                if current.value.is_some() {
                    return Ok(None);
                }

                let created = store.set_if(&path, &placeholder(id), &current.version).await?;
                Ok(created.then_some(path))
            }
            KeyMode::Pushed => {
                let key = store.push(&self.records_path(), &placeholder(id)).await?;
                let path = join(&self.records_path(), &key);

                // Push keys sort by creation, the earliest holder of the id wins.
                let earliest = self
                    .records(store)
                    .await?
                    .into_iter()
                    .filter(|(_, value)| value.get("id").and_then(as_id) == Some(id))
                    .map(|(key, _)| key)
                    .min();

                if earliest.as_deref() == Some(key.as_str()) {
                    return Ok(Some(path));
                }

                store.delete(&path).await?;
                Ok(None)
            }
        }
    }

    pub async fn locate(
        &self,
        store: &dyn RecordStore,
        id: u64,
    ) -> Result<Option<Located>, StoreError> {
        match self.key_mode {
            KeyMode::Keyed => {
                let path = self.record_path(id);
                Ok(store.get(&path).await?.map(|value| Located { path, value }))
            }
            KeyMode::Pushed => Ok(self
                .records(store)
                .await?
                .into_iter()
                .find(|(_, value)| value.get("id").and_then(as_id) == Some(id))
                .map(|(key, value)| Located {
                    path: join(&self.records_path(), &key),
                    value,
                })),
        }
    }
}

fn placeholder(id: u64) -> Value {
    json!({ "id": id })
}

/// Integer id from a JSON number or a numeric string.
pub fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A record's id: its key when the key is numeric, otherwise the embedded `id` field.
pub fn record_id(key: &str, value: &Value) -> Option<u64> {
    key.parse()
        .ok()
        .or_else(|| value.get("id").and_then(as_id))
}
