//! The five task operations exposed to hosts.
//!
//! Every operation validates its arguments first (no I/O on bad input),
//! then acquires the shared client handle, issues one or two backend calls,
//! classifies failures and sanitizes results.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{ListTasksQuery, TaskRecord};
use crate::credentials::CredentialManager;
use crate::error::{classify, GTasksError, GTasksResult};
use crate::sanitize::{sanitize_task, sanitize_tasklist, TaskListView, TaskView};
use crate::validation::{validate_date, validate_id, validate_title, validate_url};

pub const MIN_RESULTS: i64 = 1;
pub const MAX_RESULTS: i64 = 100;

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_NEEDS_ACTION: &str = "needsAction";

const LINKS_HEADING: &str = "Links:";

/// Arguments for [`TaskOperations::create_task`].
#[derive(Debug, Clone, Default)]
pub struct CreateTaskRequest {
    pub title: String,
    pub tasklist_id: String,
    pub notes: Option<String>,
    /// `YYYY-MM-DD`
    pub due_date: Option<String>,
    /// Makes the new task a subtask of this task.
    pub parent: Option<String>,
}

/// Arguments for [`TaskOperations::list_tasks`].
#[derive(Debug, Clone, Default)]
pub struct ListTasksRequest {
    pub tasklist_id: String,
    pub show_completed: bool,
    pub show_hidden: bool,
    /// Clamped to `[1, 100]`; defaults to 100.
    pub max_results: Option<i64>,
}

/// Clamp a requested page size into the backend's accepted range.
pub fn clamp_max_results(requested: i64) -> u32 {
    // Bounds fit in u32 after clamping
    requested.clamp(MIN_RESULTS, MAX_RESULTS) as u32
}

/// Host-facing task operations over a shared [`CredentialManager`].
#[derive(Debug, Clone)]
pub struct TaskOperations {
    credentials: Arc<CredentialManager>,
}

impl TaskOperations {
    pub fn new(credentials: Arc<CredentialManager>) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// All task lists, in backend order.
    pub async fn get_lists(&self) -> GTasksResult<Vec<TaskListView>> {
        const OP: &str = "get_lists";
        let client = self.credentials.acquire().await?;
        let items = client.list_tasklists().await.map_err(|e| classify(e, OP))?;

        debug!(count = items.len(), "Fetched task lists");
        items
            .iter()
            .map(|item| sanitize_tasklist(item).map_err(|e| GTasksError::unexpected(OP, e)))
            .collect()
    }

    /// Create a task, optionally due on a date and nested under a parent.
    pub async fn create_task(&self, request: CreateTaskRequest) -> GTasksResult<TaskView> {
        const OP: &str = "create_task";
        let title = validate_title(&request.title)?;
        let tasklist_id = validate_id("tasklist_id", &request.tasklist_id)?;
        let due = request.due_date.as_deref().map(validate_date).transpose()?;
        let parent = match request.parent.as_deref() {
            Some(parent) => Some(validate_id("parent", parent)?),
            None => None,
        };

        let mut body = TaskRecord::new();
        body.insert("title".into(), Value::from(title));
        if let Some(notes) = request.notes {
            body.insert("notes".into(), Value::from(notes));
        }
        if let Some(due) = due {
            body.insert("due".into(), Value::from(due_timestamp(due)));
        }

        let client = self.credentials.acquire().await?;
        let created = client
            .insert_task(tasklist_id, &body, parent)
            .await
            .map_err(|e| classify(e, OP))?;

        let task_id = created.get("id").and_then(Value::as_str).unwrap_or_default();
        info!(
            tasklist_id,
            task_id,
            subtask = parent.is_some(),
            "Created task"
        );
        Ok(sanitize_task(&created))
    }

    /// Tasks in one list, in backend order.
    pub async fn list_tasks(&self, request: ListTasksRequest) -> GTasksResult<Vec<TaskView>> {
        const OP: &str = "list_tasks";
        let tasklist_id = validate_id("tasklist_id", &request.tasklist_id)?;
        let query = ListTasksQuery {
            show_completed: request.show_completed,
            show_hidden: request.show_hidden,
            max_results: clamp_max_results(request.max_results.unwrap_or(MAX_RESULTS)),
        };

        let client = self.credentials.acquire().await?;
        let records = client
            .list_tasks(tasklist_id, &query)
            .await
            .map_err(|e| classify(e, OP))?;

        debug!(tasklist_id, count = records.len(), "Fetched tasks");
        Ok(records.iter().map(sanitize_task).collect())
    }

    /// Mark a task done or not done. Read-modify-write of the full record.
    pub async fn complete_task(
        &self,
        tasklist_id: &str,
        task_id: &str,
        completed: bool,
    ) -> GTasksResult<TaskView> {
        const OP: &str = "complete_task";
        let tasklist_id = validate_id("tasklist_id", tasklist_id)?;
        let task_id = validate_id("task_id", task_id)?;

        let client = self.credentials.acquire().await?;
        let mut record = client
            .get_task(tasklist_id, task_id)
            .await
            .map_err(|e| classify(e, OP))?;

        set_completion(&mut record, completed, Utc::now());

        let updated = client
            .update_task(tasklist_id, task_id, &record)
            .await
            .map_err(|e| classify(e, OP))?;

        info!(tasklist_id, task_id, completed, "Updated task completion");
        Ok(sanitize_task(&updated))
    }

    /// Append a markdown link to a task's notes under a `Links:` heading.
    pub async fn add_link(
        &self,
        tasklist_id: &str,
        task_id: &str,
        url: &str,
        label: Option<&str>,
    ) -> GTasksResult<TaskView> {
        const OP: &str = "add_link";
        let tasklist_id = validate_id("tasklist_id", tasklist_id)?;
        let task_id = validate_id("task_id", task_id)?;
        validate_url(url)?;

        let client = self.credentials.acquire().await?;
        let mut record = client
            .get_task(tasklist_id, task_id)
            .await
            .map_err(|e| classify(e, OP))?;

        let notes = record
            .get("notes")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let notes = append_link(notes, url, label);
        record.insert("notes".into(), Value::from(notes));

        let updated = client
            .update_task(tasklist_id, task_id, &record)
            .await
            .map_err(|e| classify(e, OP))?;

        info!(tasklist_id, task_id, %url, "Appended link to task notes");
        Ok(sanitize_task(&updated))
    }
}

/// Due dates are sent as midnight UTC on the given day.
fn due_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

fn completion_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Set `status` and the `completed` timestamp for the target state.
pub fn set_completion(record: &mut TaskRecord, completed: bool, now: DateTime<Utc>) {
    if completed {
        record.insert("status".into(), Value::from(STATUS_COMPLETED));
        record.insert("completed".into(), Value::from(completion_timestamp(now)));
    } else {
        record.insert("status".into(), Value::from(STATUS_NEEDS_ACTION));
        record.remove("completed");
    }
}

/// Return `notes` with a `- [label](url)` bullet appended to its links
/// section, creating the section if absent. The label falls back to the URL.
pub fn append_link(notes: &str, url: &str, label: Option<&str>) -> String {
    let label = label.filter(|l| !l.is_empty()).unwrap_or(url);
    let bullet = format!("- [{label}]({url})");

    if notes.contains(LINKS_HEADING) {
        format!("{notes}\n{bullet}")
    } else if notes.is_empty() {
        format!("{LINKS_HEADING}\n{bullet}")
    } else {
        format!("{notes}\n\n{LINKS_HEADING}\n{bullet}")
    }
}
