//! Credential acquisition as observed through the MCP surface.

use chrono::TimeDelta;
use secrecy::ExposeSecret;
use serde_json::json;

use gtasks_mock_backend::REVOKED_REFRESH_TOKEN;

use crate::common::E2eEnv;

#[tokio::test]
async fn test_stored_credential_used_without_token_grant() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.seed_credential("stored-access", "1//refresh", TimeDelta::hours(1))?;
    env.backend().add_list("Inbox").await;

    let harness = env.harness().await?;
    let lists = harness.call_tool("get_lists", json!({})).await?;
    assert_eq!(lists[0]["title"], "Inbox");
    assert_eq!(env.backend().last_bearer().as_deref(), Some("stored-access"));
    assert_eq!(env.backend().token_grants(), 0);

    harness.shutdown().await
}

#[tokio::test]
async fn test_expired_credential_refreshed_and_persisted() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.write_identity()?;
    env.seed_credential("stale-access", "1//keep-me", -TimeDelta::minutes(5))?;

    let harness = env.harness().await?;
    let lists = harness.call_tool("get_lists", json!({})).await?;
    assert!(lists.as_array().is_some_and(Vec::is_empty), "got {lists}");
    assert_eq!(env.backend().token_grants(), 1);

    let bearer = env.backend().last_bearer().unwrap_or_default();
    assert!(bearer.starts_with("mock-access-"), "bearer was {bearer}");

    // Refreshed access token persisted; refresh token carried over
    let stored = env.stored_credential().expect("credential persisted");
    assert_eq!(stored.access_token.expose_secret(), bearer);
    assert_eq!(
        stored.refresh_token.as_ref().map(|t| t.expose_secret()),
        Some("1//keep-me")
    );
    assert!(!stored.is_expired());

    // Second call reuses the established handle
    harness.call_tool("get_lists", json!({})).await?;
    assert_eq!(env.backend().token_grants(), 1);

    harness.shutdown().await
}

#[tokio::test]
async fn test_token_file_refreshes_without_identity_file() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.write_authorized_user_token("1//legacy")?;
    env.backend().add_list("Inbox").await;
    assert!(!env.config.client_secrets_path.exists());

    let harness = env.harness().await?;
    let lists = harness.call_tool("get_lists", json!({})).await?;
    assert_eq!(lists[0]["title"], "Inbox", "got {lists}");
    assert_eq!(env.backend().token_grants(), 1);

    // Rewritten record keeps the client so the next refresh works the same way
    let stored = env.stored_credential().expect("credential persisted");
    assert_eq!(stored.client_id.as_deref(), Some("e2e-client.apps.example.com"));
    assert_eq!(stored.token_uri, Some(env.server.token_url()));
    assert_eq!(
        stored.refresh_token.as_ref().map(|t| t.expose_secret()),
        Some("1//legacy")
    );
    assert!(!stored.is_expired());

    harness.shutdown().await
}

#[tokio::test]
async fn test_revoked_refresh_falls_back_and_fails_with_auth_error() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.write_identity()?;
    env.seed_credential("stale-access", REVOKED_REFRESH_TOKEN, -TimeDelta::minutes(5))?;

    let harness = env.harness().await?;
    // Interactive consent is attempted and times out: nobody visits the URL
    let result = harness.call_tool("get_lists", json!({})).await?;
    assert_eq!(result["error"], "authentication_error");
    assert_eq!(result["reauthenticate"], true);
    assert_eq!(env.backend().token_grants(), 1);
    assert_eq!(env.backend().request_count(), 0);

    harness.shutdown().await
}

#[tokio::test]
async fn test_missing_identity_reports_authentication_error() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;

    let harness = env.harness().await?;
    let result = harness.call_tool("get_lists", json!({})).await?;
    assert_eq!(result["error"], "authentication_error");
    assert!(
        result["message"].as_str().unwrap_or_default().contains("not found"),
        "got {result}"
    );
    assert_eq!(env.backend().request_count(), 0);

    harness.shutdown().await
}

#[tokio::test]
async fn test_rejected_credential_on_use_is_authentication_error() -> anyhow::Result<()> {
    let env = E2eEnv::new().await?;
    env.seed_credential("revoked-elsewhere", "1//r", TimeDelta::hours(1))?;
    env.backend().fail_with(401, "Invalid Credentials");

    let harness = env.harness().await?;
    let result = harness.call_tool("get_lists", json!({})).await?;
    assert_eq!(result["error"], "authentication_error");
    assert_eq!(result["retryable"], false);

    harness.shutdown().await
}
