//! Shared end-to-end fixtures.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use rmcp::model::{CallToolRequestParams, ClientInfo};
use rmcp::service::{RoleClient, RunningService};
use rmcp::{ClientHandler, ServiceExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use gtasks_client::config::TASKS_SCOPE;
use gtasks_client::{ClientConfig, Credential, CredentialManager, CredentialStore};
use gtasks_mcp::server::GTasksMcpServer;
use gtasks_mock_backend::{MockBackend, RunningBackend};

#[derive(Debug, Clone, Default)]
pub struct TestClient;

impl ClientHandler for TestClient {
    fn get_info(&self) -> ClientInfo {
        ClientInfo::default()
    }
}

/// Temporary config directory plus a running mock backend.
pub struct E2eEnv {
    pub dir: TempDir,
    pub server: RunningBackend,
    pub config: ClientConfig,
}

impl E2eEnv {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let server = MockBackend::new().spawn().await?;
        let config = ClientConfig {
            client_secrets_path: dir.path().join("credentials.json"),
            token_path: dir.path().join("token.json"),
            api_base_url: server.base_url(),
            open_browser: false,
            consent_timeout_secs: 1,
            ..ClientConfig::default()
        };
        Ok(Self {
            dir,
            server,
            config,
        })
    }

    pub fn backend(&self) -> &MockBackend {
        &self.server.backend
    }

    pub fn token_path(&self) -> PathBuf {
        self.config.token_path.clone()
    }

    /// Write a console-style client identity pointing at the mock token endpoint.
    pub fn write_identity(&self) -> Result<()> {
        let identity = serde_json::json!({
            "installed": {
                "client_id": "e2e-client.apps.example.com",
                "client_secret": "e2e-secret",
                "auth_uri": "http://127.0.0.1:9/o/oauth2/auth",
                "token_uri": self.server.token_url(),
                "redirect_uris": ["http://localhost"]
            }
        });
        std::fs::write(
            &self.config.client_secrets_path,
            serde_json::to_vec_pretty(&identity)?,
        )?;
        Ok(())
    }

    /// Persist a credential expiring `expires_in` from now.
    pub fn seed_credential(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in: TimeDelta,
    ) -> Result<()> {
        let credential = Credential::new(
            access_token,
            Some(refresh_token.to_string()),
            Utc::now() + expires_in,
            [TASKS_SCOPE.to_string()],
        );
        CredentialStore::new(self.token_path()).try_save(&credential)?;
        Ok(())
    }

    /// Write an expired authorized-user token file that names its own
    /// client and token endpoint, as earlier installs persisted it.
    pub fn write_authorized_user_token(&self, refresh_token: &str) -> Result<()> {
        let token = serde_json::json!({
            "token": "stale-access",
            "refresh_token": refresh_token,
            "token_uri": self.server.token_url(),
            "client_id": "e2e-client.apps.example.com",
            "client_secret": "e2e-secret",
            "scopes": [TASKS_SCOPE],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2024-05-01T12:00:00.123456Z"
        });
        std::fs::write(self.token_path(), serde_json::to_vec_pretty(&token)?)?;
        Ok(())
    }

    pub fn stored_credential(&self) -> Option<Credential> {
        CredentialStore::new(self.token_path()).load()
    }

    pub async fn harness(&self) -> Result<McpHarness> {
        McpHarness::start(self.config.clone()).await
    }
}

/// MCP server/client pair over an in-memory duplex transport.
pub struct McpHarness {
    pub client: RunningService<RoleClient, TestClient>,
    server_handle: JoinHandle<Result<()>>,
}

impl McpHarness {
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let credentials = Arc::new(CredentialManager::new(config)?);
        let server = GTasksMcpServer::with_credentials(credentials);
        let (server_transport, client_transport) = tokio::io::duplex(65536);

        let server_handle = tokio::spawn(async move {
            let service = server.serve(server_transport).await?;
            service.waiting().await?;
            anyhow::Ok(())
        });

        let client = TestClient.serve(client_transport).await?;
        Ok(Self {
            client,
            server_handle,
        })
    }

    /// Call an MCP tool and parse the text response as JSON.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
        let result = self
            .client
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_string().into(),
                arguments: args.as_object().cloned(),
                task: None,
            })
            .await?;

        let text = result
            .content
            .first()
            .and_then(|c| c.raw.as_text())
            .map(|t| t.text.clone())
            .ok_or_else(|| anyhow::anyhow!("No text content in tool response"))?;

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn shutdown(self) -> Result<()> {
        self.client.cancel().await?;
        self.server_handle.await??;
        Ok(())
    }
}
