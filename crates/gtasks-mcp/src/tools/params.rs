//! Parameter structs for all MCP tools.

use schemars::JsonSchema;
use serde::Deserialize;

use gtasks_client::{CreateTaskRequest, ListTasksRequest};

// ── create_task ──

/// Parameters for the `create_task` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskParams {
    #[schemars(description = "Task title (1-1024 characters)")]
    pub title: String,
    #[schemars(description = "ID of the target task list (from get_lists)")]
    pub tasklist_id: String,
    #[schemars(description = "Optional notes / description for the task")]
    pub notes: Option<String>,
    #[schemars(description = "Optional due date in YYYY-MM-DD format")]
    pub due_date: Option<String>,
    #[schemars(description = "Optional parent task ID; the new task becomes its subtask")]
    pub parent: Option<String>,
}

impl From<CreateTaskParams> for CreateTaskRequest {
    fn from(params: CreateTaskParams) -> Self {
        Self {
            title: params.title,
            tasklist_id: params.tasklist_id,
            notes: params.notes,
            due_date: params.due_date,
            parent: params.parent,
        }
    }
}

// ── list_tasks ──

/// Parameters for the `list_tasks` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTasksParams {
    #[schemars(description = "ID of the task list to read (from get_lists)")]
    pub tasklist_id: String,
    #[schemars(description = "Include completed tasks (default false)")]
    pub show_completed: Option<bool>,
    #[schemars(description = "Include hidden tasks (default false)")]
    pub show_hidden: Option<bool>,
    #[schemars(description = "Maximum number of tasks to return, 1-100 (default 100)")]
    pub max_results: Option<i64>,
}

impl From<ListTasksParams> for ListTasksRequest {
    fn from(params: ListTasksParams) -> Self {
        Self {
            tasklist_id: params.tasklist_id,
            show_completed: params.show_completed.unwrap_or(false),
            show_hidden: params.show_hidden.unwrap_or(false),
            max_results: params.max_results,
        }
    }
}

// ── complete_task ──

/// Parameters for the `complete_task` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompleteTaskParams {
    #[schemars(description = "ID of the task list containing the task")]
    pub tasklist_id: String,
    #[schemars(description = "ID of the task to update")]
    pub task_id: String,
    #[schemars(description = "true to mark completed, false to mark as needing action")]
    pub completed: bool,
}

// ── add_link ──

/// Parameters for the `add_link` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddLinkParams {
    #[schemars(description = "ID of the task list containing the task")]
    pub tasklist_id: String,
    #[schemars(description = "ID of the task to attach the link to")]
    pub task_id: String,
    #[schemars(description = "Link target; must start with http:// or https://")]
    pub url: String,
    #[schemars(description = "Optional display text; defaults to the URL")]
    pub label: Option<String>,
}
