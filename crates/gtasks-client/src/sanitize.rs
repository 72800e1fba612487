//! Projection of backend records onto the stable public field set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task fields passed through to callers. Anything else the backend sends
/// (etag, links, position, kind, ...) is dropped.
pub const TASK_FIELDS: [&str; 8] = [
    "id",
    "title",
    "notes",
    "due",
    "status",
    "parent",
    "updated",
    "completed",
];

/// Public view of a task.
///
/// Fields absent from the source record stay absent; nothing is defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// True iff the source record carried a `parent`.
    pub is_subtask: bool,
}

impl TaskView {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Public view of a task list. Both fields are required of the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListView {
    pub id: String,
    pub title: String,
}

/// Project a task record onto [`TASK_FIELDS`] and derive `is_subtask`.
pub fn sanitize_task(record: &Map<String, Value>) -> TaskView {
    let fields = TASK_FIELDS
        .iter()
        .filter_map(|&key| record.get(key).map(|v| (key.to_string(), v.clone())))
        .collect();

    TaskView {
        fields,
        is_subtask: record.contains_key("parent"),
    }
}

/// Project a task list record onto `{id, title}`.
///
/// A record missing either field breaks the backend contract and fails to
/// decode.
pub fn sanitize_tasklist(record: &Value) -> Result<TaskListView, serde_json::Error> {
    TaskListView::deserialize(record)
}
