//! MCP ServerHandler implementation for the task backend.
//!
//! Tools:
//! - `get_lists`: List all task lists
//! - `create_task`: Create a task or subtask, optionally with notes and a due date
//! - `list_tasks`: List tasks in a list, with completion/hidden filters
//! - `complete_task`: Mark a task completed or back to needing action
//! - `add_link`: Append a markdown link to a task's notes
//!
//! Every tool returns pretty JSON on success and a structured error object
//! (`error`, `message`, `retryable`, `reauthenticate`) on failure.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use tracing::debug;

use gtasks_client::{CredentialManager, TaskOperations};

use crate::tools::*;

/// MCP server handler exposing task-list operations.
#[derive(Debug, Clone)]
pub struct GTasksMcpServer {
    tool_router: ToolRouter<Self>,
    operations: TaskOperations,
}

impl GTasksMcpServer {
    pub fn new(operations: TaskOperations) -> Self {
        Self {
            tool_router: Self::tool_router(),
            operations,
        }
    }

    pub fn with_credentials(credentials: Arc<CredentialManager>) -> Self {
        Self::new(TaskOperations::new(credentials))
    }

    pub fn operations(&self) -> &TaskOperations {
        &self.operations
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for GTasksMcpServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = "You manage the user's task lists. Start with get_lists to find \
             list IDs, then list_tasks to find task IDs.\n\
             create_task adds a task (pass parent to create a subtask; due_date is YYYY-MM-DD).\n\
             complete_task toggles completion; add_link attaches a URL under a 'Links:' \
             section in the task notes.\n\
             Errors are JSON objects with an 'error' code. If 'retryable' is true, back off and \
             retry. If 'reauthenticate' is true, ask the operator to run `gtasks-mcp --auth`."
            .to_string();

        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "gtasks-mcp".to_string(),
                title: Some("Task Lists MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some(
                    "MCP server for reading and updating task lists: create tasks and \
                     subtasks, toggle completion, attach links"
                        .to_string(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(instructions),
        }
    }
}

#[tool_router(router = tool_router)]
impl GTasksMcpServer {
    /// List all task lists for the authenticated user.
    #[tool(
        name = "get_lists",
        description = "Get all task lists for the authenticated user. Returns an array of {id, title}. Use the id as tasklist_id in the other tools."
    )]
    pub async fn get_lists(&self) -> String {
        debug!(tool = "get_lists", "Tool invoked");
        match self.operations.get_lists().await {
            Ok(lists) => result_json(&lists),
            Err(e) => operation_error_json(&e),
        }
    }

    /// Create a new task or subtask.
    #[tool(
        name = "create_task",
        description = "Create a new task in a task list. Title is required (max 1024 characters). Optional notes, due_date (YYYY-MM-DD) and parent (task ID, makes this a subtask). Returns the created task."
    )]
    pub async fn create_task(&self, Parameters(params): Parameters<CreateTaskParams>) -> String {
        debug!(tool = "create_task", tasklist_id = %params.tasklist_id, "Tool invoked");
        match self.operations.create_task(params.into()).await {
            Ok(task) => result_json(&task),
            Err(e) => operation_error_json(&e),
        }
    }

    /// List tasks from a task list.
    #[tool(
        name = "list_tasks",
        description = "List tasks in a task list. Completed and hidden tasks are excluded unless show_completed / show_hidden are true. max_results is clamped to 1-100 (default 100). Each task carries is_subtask."
    )]
    pub async fn list_tasks(&self, Parameters(params): Parameters<ListTasksParams>) -> String {
        debug!(tool = "list_tasks", tasklist_id = %params.tasklist_id, "Tool invoked");
        match self.operations.list_tasks(params.into()).await {
            Ok(tasks) => result_json(&tasks),
            Err(e) => operation_error_json(&e),
        }
    }

    /// Toggle task completion.
    #[tool(
        name = "complete_task",
        description = "Mark a task as completed (completed=true) or as needing action (completed=false). Returns the updated task."
    )]
    pub async fn complete_task(
        &self,
        Parameters(params): Parameters<CompleteTaskParams>,
    ) -> String {
        debug!(tool = "complete_task", task_id = %params.task_id, "Tool invoked");
        match self
            .operations
            .complete_task(&params.tasklist_id, &params.task_id, params.completed)
            .await
        {
            Ok(task) => result_json(&task),
            Err(e) => operation_error_json(&e),
        }
    }

    /// Attach a link to a task's notes.
    #[tool(
        name = "add_link",
        description = "Add a web link (Jira issue, pull request, document, ...) to a task's notes under a 'Links:' section as a markdown bullet. url must be http:// or https://; label defaults to the URL. Returns the updated task."
    )]
    pub async fn add_link(&self, Parameters(params): Parameters<AddLinkParams>) -> String {
        debug!(tool = "add_link", task_id = %params.task_id, "Tool invoked");
        match self
            .operations
            .add_link(
                &params.tasklist_id,
                &params.task_id,
                &params.url,
                params.label.as_deref(),
            )
            .await
        {
            Ok(task) => result_json(&task),
            Err(e) => operation_error_json(&e),
        }
    }
}
