use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const DEFAULT_STATUS: &str = "pending";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: u64,
    pub task: String,
    pub status: String,
}

impl TaskRecord {
    pub fn new(id: u64, task: String) -> Self {
        Self {
            id,
            task,
            status: DEFAULT_STATUS.to_string(),
        }
    }

    /// Supplied fields win, everything else keeps the stored value.
    pub fn merged(id: u64, stored: &Value, changes: TaskChanges) -> Self {
        let stored_text = |key: &str| {
            stored
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id,
            task: changes.task.unwrap_or_else(|| stored_text("task")),
            status: changes.status.unwrap_or_else(|| stored_text("status")),
        }
    }

    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(self.id));
        fields.insert("task".to_string(), Value::String(self.task));
        fields.insert("status".to_string(), Value::String(self.status));
        fields
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub parts: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub id: u64,
    pub destination: String,
    pub arrive_time: String,
    pub no_of_stayed_days: i64,
    pub arrival_date: String,
    pub departure_date: String,
    pub leave_time: String,
    pub timestamp: String,
}

#[derive(Deserialize, Default)]
pub struct NewTask {
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct TaskChanges {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct NewChat {
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default)]
    pub model_reply: Option<String>,
}

#[derive(Serialize)]
pub struct Message {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct Created {
    pub message: &'static str,
    pub id: u64,
}

#[derive(Serialize)]
pub struct ChatLogged {
    pub message: &'static str,
    pub id: u64,
    pub reply_id: u64,
}

#[derive(Serialize)]
pub struct TripRecorded {
    pub message: &'static str,
    pub data: TripRecord,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ChatMessage, Role, TaskChanges, TaskRecord};

    #[test]
    fn test_merge_keeps_missing_fields() {
        let stored = json!({"id": 1, "task": "buy milk", "status": "pending"});
        let changes = TaskChanges {
            status: Some("done".to_string()),
            ..Default::default()
        };

        let merged = TaskRecord::merged(1, &stored, changes);
        assert_eq!(merged.task, "buy milk");
        assert_eq!(merged.status, "done");
    }

    #[test]
    fn test_merge_overwrites_with_empty_text() {
        let stored = json!({"id": 1, "task": "buy milk", "status": "pending"});
        let changes = TaskChanges {
            task: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(TaskRecord::merged(1, &stored, changes).task, "");
    }

    #[test]
    fn test_fields() {
        let fields = TaskRecord::new(3, "walk".to_string()).into_fields();

        assert_eq!(
            serde_json::Value::Object(fields),
            json!({"id": 3, "task": "walk", "status": "pending"})
        );
    }

    #[test]
    fn test_role_is_lowercase() {
        let message = ChatMessage {
            id: 1,
            role: Role::Model,
            parts: "hi".to_string(),
            timestamp: "2024-03-01T09:15:00+08:00".to_string(),
        };

        assert_eq!(serde_json::to_value(&message).unwrap()["role"], "model");
    }
}
