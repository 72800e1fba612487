//! Operator smoke test: force credential acquisition and list task lists.

use gtasks_client::{GTasksResult, TaskOperations};

/// Acquire credentials (running consent if needed) and render a summary of
/// the user's task lists.
pub async fn verify_credentials(operations: &TaskOperations) -> GTasksResult<String> {
    let lists = operations.get_lists().await?;

    let mut report = format!(
        "Authenticated successfully. Found {} task list(s):",
        lists.len()
    );
    for list in &lists {
        report.push_str(&format!("\n  - {} ({})", list.title, list.id));
    }
    Ok(report)
}
