//! Authorized REST handle onto the task backend.
//!
//! Thin: each method is one HTTP call returning raw records. Classification
//! and sanitization happen in [`crate::operations`].

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::{BackendError, GTasksError, GTasksResult};

/// A raw backend task record. Kept as a map so write-back preserves fields
/// this crate does not model.
pub type TaskRecord = Map<String, Value>;

/// Backend paging envelope. `items` is omitted when the collection is empty.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Query options for listing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub show_completed: bool,
    pub show_hidden: bool,
    pub max_results: u32,
}

/// Authorized client handle. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct TasksClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: SecretString,
}

impl TasksClient {
    pub fn new(
        base_url: &str,
        access_token: SecretString,
        request_timeout: Duration,
    ) -> GTasksResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            GTasksError::config_error(format!("invalid api_base_url '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GTasksError::config_error(format!(
                "api_base_url '{base_url}' cannot be a base URL"
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GTasksError::unexpected("http_client", e))?;

        Ok(Self {
            http,
            base_url,
            access_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "Backend request");
        self.http
            .request(method, url)
            .bearer_auth(self.access_token.expose_secret())
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string()),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET users/@me/lists`
    pub async fn list_tasklists(&self) -> Result<Vec<Value>, BackendError> {
        let page: Page<Value> =
            Self::send(self.request(Method::GET, &["users", "@me", "lists"])).await?;
        Ok(page.items)
    }

    /// `GET lists/{tasklist}/tasks`
    pub async fn list_tasks(
        &self,
        tasklist: &str,
        query: &ListTasksQuery,
    ) -> Result<Vec<TaskRecord>, BackendError> {
        let request = self
            .request(Method::GET, &["lists", tasklist, "tasks"])
            .query(query);
        let page: Page<TaskRecord> = Self::send(request).await?;
        Ok(page.items)
    }

    /// `POST lists/{tasklist}/tasks[?parent=]`
    pub async fn insert_task(
        &self,
        tasklist: &str,
        body: &TaskRecord,
        parent: Option<&str>,
    ) -> Result<TaskRecord, BackendError> {
        let mut request = self
            .request(Method::POST, &["lists", tasklist, "tasks"])
            .json(body);
        if let Some(parent) = parent {
            request = request.query(&[("parent", parent)]);
        }
        Self::send(request).await
    }

    /// `GET lists/{tasklist}/tasks/{task}`
    pub async fn get_task(&self, tasklist: &str, task: &str) -> Result<TaskRecord, BackendError> {
        Self::send(self.request(Method::GET, &["lists", tasklist, "tasks", task])).await
    }

    /// `PUT lists/{tasklist}/tasks/{task}`: full replacement with `body`.
    pub async fn update_task(
        &self,
        tasklist: &str,
        task: &str,
        body: &TaskRecord,
    ) -> Result<TaskRecord, BackendError> {
        let request = self
            .request(Method::PUT, &["lists", tasklist, "tasks", task])
            .json(body);
        Self::send(request).await
    }
}

/// Extract `error.message` from a backend error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
}
