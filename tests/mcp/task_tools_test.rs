//! Task tools end to end: create, list, link, complete.

use chrono::TimeDelta;
use serde_json::json;

use crate::common::E2eEnv;

#[tokio::test]
async fn test_task_lifecycle() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.seed_credential("access", "1//r", TimeDelta::hours(1))?;
    let list = env.backend().add_list("Sprint").await;

    let harness = env.harness().await?;

    let parent = harness
        .call_tool(
            "create_task",
            json!({"title": "Release 1.2", "tasklist_id": list, "due_date": "2024-06-30"}),
        )
        .await?;
    let parent_id = parent["id"].as_str().unwrap().to_string();
    assert_eq!(parent["due"], "2024-06-30T00:00:00.000Z");
    assert_eq!(parent["is_subtask"], false);

    let child = harness
        .call_tool(
            "create_task",
            json!({"title": "Tag build", "tasklist_id": list, "parent": parent_id}),
        )
        .await?;
    let child_id = child["id"].as_str().unwrap().to_string();
    assert_eq!(child["is_subtask"], true);
    assert_eq!(child["parent"], parent_id.as_str());

    let linked = harness
        .call_tool(
            "add_link",
            json!({"tasklist_id": list, "task_id": child_id, "url": "https://ci.example.com/b/42"}),
        )
        .await?;
    assert_eq!(
        linked["notes"],
        "Links:\n- [https://ci.example.com/b/42](https://ci.example.com/b/42)"
    );

    let done = harness
        .call_tool(
            "complete_task",
            json!({"tasklist_id": list, "task_id": child_id, "completed": true}),
        )
        .await?;
    assert_eq!(done["status"], "completed");
    assert!(done.get("completed").is_some());

    // Completed tasks are hidden by default
    let open = harness
        .call_tool("list_tasks", json!({"tasklist_id": list}))
        .await?;
    let open_ids: Vec<&str> = open
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert_eq!(open_ids, vec![parent_id.as_str()]);

    let all = harness
        .call_tool(
            "list_tasks",
            json!({"tasklist_id": list, "show_completed": true, "max_results": 1000}),
        )
        .await?;
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(
        env.backend()
            .last_query()
            .unwrap()
            .get("maxResults")
            .map(String::as_str),
        Some("100")
    );

    harness.shutdown().await
}

#[tokio::test]
async fn test_validation_errors_skip_backend() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.seed_credential("access", "1//r", TimeDelta::hours(1))?;
    let harness = env.harness().await?;

    let bad_date = harness
        .call_tool(
            "create_task",
            json!({"title": "x", "tasklist_id": "L", "due_date": "2024-02-30"}),
        )
        .await?;
    assert_eq!(bad_date["error"], "validation_error");

    let blank_title = harness
        .call_tool("create_task", json!({"title": "   ", "tasklist_id": "L"}))
        .await?;
    assert_eq!(blank_title["error"], "validation_error");

    let bad_url = harness
        .call_tool(
            "add_link",
            json!({"tasklist_id": "L", "task_id": "t", "url": "www.example.com"}),
        )
        .await?;
    assert_eq!(bad_url["error"], "validation_error");

    assert_eq!(env.backend().request_count(), 0);
    harness.shutdown().await
}

#[tokio::test]
async fn test_backend_errors_carry_recovery_hints() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.seed_credential("access", "1//r", TimeDelta::hours(1))?;
    let list = env.backend().add_list("L").await;
    let harness = env.harness().await?;

    let missing = harness
        .call_tool(
            "complete_task",
            json!({"tasklist_id": list, "task_id": "ghost", "completed": true}),
        )
        .await?;
    assert_eq!(missing["error"], "not_found");
    assert_eq!(missing["retryable"], false);

    env.backend().fail_with(503, "Backend Error");
    let unavailable = harness
        .call_tool("list_tasks", json!({"tasklist_id": list}))
        .await?;
    assert_eq!(unavailable["error"], "unavailable");
    assert_eq!(unavailable["retryable"], true);

    harness.shutdown().await
}
