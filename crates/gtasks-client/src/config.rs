//! Client configuration.
//!
//! Resolution order, later layers winning:
//! 1. Built-in defaults ([`ClientConfig::default`])
//! 2. A TOML file: explicit path, else `./gtasks-mcp.toml`, else
//!    `<config_dir>/gtasks-mcp/config.toml`
//! 3. `GTASKS_*` environment variables (e.g. `GTASKS_TOKEN_PATH`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GTasksError, GTasksResult};

pub const APP_DIR: &str = "gtasks-mcp";
pub const LOCAL_CONFIG_FILENAME: &str = "gtasks-mcp.toml";
pub const GLOBAL_CONFIG_FILENAME: &str = "config.toml";
pub const ENV_PREFIX: &str = "GTASKS";

/// Scope granting read/write access to the user's tasks.
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";
pub const DEFAULT_API_BASE_URL: &str = "https://tasks.googleapis.com/tasks/v1";

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// OAuth client identity issued by the provider console.
    pub client_secrets_path: PathBuf,
    /// Persisted credential (access + refresh token).
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// Upper bound on the interactive consent wait.
    pub consent_timeout_secs: u64,
    /// Launch the system browser for consent; the URL is logged either way.
    pub open_browser: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let dir = app_config_dir();
        Self {
            client_secrets_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
            scopes: vec![TASKS_SCOPE.to_string()],
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            consent_timeout_secs: 300,
            open_browser: true,
        }
    }
}

impl ClientConfig {
    /// Load using the discovered config file, if any.
    pub fn load() -> GTasksResult<Self> {
        match Self::find_config_file() {
            Some(path) => {
                debug!(path = %path.display(), "Loading client config");
                Self::build(Some(&path))
            }
            None => {
                debug!("No config file found, using defaults and environment");
                Self::build(None)
            }
        }
    }

    /// Load from an explicit file. The file must exist.
    pub fn load_from_path(path: &Path) -> GTasksResult<Self> {
        if !path.is_file() {
            return Err(GTasksError::config_error(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::build(Some(path))
    }

    /// Search for a config file in precedence order.
    pub fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILENAME);
        if local.is_file() {
            return Some(local);
        }

        let global = app_config_dir().join(GLOBAL_CONFIG_FILENAME);
        global.is_file().then_some(global)
    }

    fn build(file: Option<&Path>) -> GTasksResult<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| GTasksError::config_error(format!("invalid defaults: {e}")))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scopes")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| GTasksError::config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> GTasksResult<()> {
        if self.scopes.is_empty() {
            return Err(GTasksError::config_error("at least one scope is required"));
        }
        url::Url::parse(&self.api_base_url).map_err(|e| {
            GTasksError::config_error(format!("invalid api_base_url '{}': {e}", self.api_base_url))
        })?;
        if self.consent_timeout_secs == 0 {
            return Err(GTasksError::config_error(
                "consent_timeout_secs must be positive",
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }
}

/// `<config_dir>/gtasks-mcp`, or `./gtasks-mcp` when the platform has no
/// config directory.
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
