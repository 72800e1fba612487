//! In-memory task backend speaking the same REST shapes as the hosted
//! service, with status-code failure injection and request counting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub type Record = Map<String, Value>;

/// Path prefix the routes are mounted under.
pub const API_PREFIX: &str = "/tasks/v1";

/// OAuth token endpoint path, outside the bearer-protected API.
pub const TOKEN_PATH: &str = "/token";

/// Refresh token the token endpoint rejects with `invalid_grant`.
pub const REVOKED_REFRESH_TOKEN: &str = "revoked";

#[derive(Debug, Default)]
struct Db {
    lists: Vec<Record>,
    /// Tasks per list id, in insertion order.
    tasks: HashMap<String, Vec<Record>>,
}

#[derive(Debug, Default)]
struct Inner {
    db: RwLock<Db>,
    failure: Mutex<Option<(StatusCode, String)>>,
    requests: AtomicUsize,
    next_id: AtomicU64,
    last_query: Mutex<Option<HashMap<String, String>>>,
    last_bearer: Mutex<Option<String>>,
    token_grants: AtomicUsize,
}

/// Shared handle; clones observe and mutate the same backend.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Inner>,
}

/// A backend serving on a loopback port.
#[derive(Debug)]
pub struct RunningBackend {
    pub backend: MockBackend,
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RunningBackend {
    /// Value suitable for `api_base_url`.
    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, API_PREFIX)
    }

    /// Value suitable for a client identity's `token_uri`.
    pub fn token_url(&self) -> String {
        format!("http://{}{}", self.addr, TOKEN_PATH)
    }
}

impl Drop for RunningBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    show_completed: Option<bool>,
    show_hidden: Option<bool>,
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct InsertQuery {
    parent: Option<String>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn api_error(status: StatusCode, message: &str) -> Response {
    let body = json!({
        "error": {
            "code": status.as_u16(),
            "message": message,
            "errors": [{"message": message, "domain": "global"}]
        }
    });
    (status, Json(body)).into_response()
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n}")
    }

    /// Add an empty task list, returning its id.
    pub async fn add_list(&self, title: &str) -> String {
        let id = self.next_id("list-");
        let record = json!({
            "kind": "tasks#taskList",
            "id": id,
            "etag": format!("\"{id}-etag\""),
            "title": title,
            "updated": now(),
            "selfLink": format!("https://tasks.invalid/lists/{id}")
        });
        let mut db = self.inner.db.write().await;
        if let Value::Object(record) = record {
            db.lists.push(record);
        }
        db.tasks.insert(id.clone(), Vec::new());
        id
    }

    /// Seed a task. Missing `id` and `status` are filled in.
    pub async fn add_task(&self, list_id: &str, task: Value) -> String {
        let mut record = match task {
            Value::Object(record) => record,
            _ => Record::new(),
        };
        let id = match record.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.next_id("task-"),
        };
        self.decorate(&mut record, &id);
        record
            .entry("status")
            .or_insert_with(|| Value::from("needsAction"));

        self.inner
            .db
            .write()
            .await
            .tasks
            .entry(list_id.to_string())
            .or_default()
            .push(record);
        id
    }

    /// Current stored record for a task.
    pub async fn task(&self, list_id: &str, task_id: &str) -> Option<Record> {
        let db = self.inner.db.read().await;
        db.tasks
            .get(list_id)?
            .iter()
            .find(|t| t.get("id").and_then(Value::as_str) == Some(task_id))
            .cloned()
    }

    /// Answer every subsequent request with `status` until cleared.
    pub fn fail_with(&self, status: u16, message: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if let Ok(mut failure) = self.inner.failure.lock() {
            *failure = Some((status, message.to_string()));
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.inner.failure.lock() {
            *failure = None;
        }
    }

    /// Requests received, including rejected ones.
    pub fn request_count(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }

    /// Token grants served, successful or not.
    pub fn token_grants(&self) -> usize {
        self.inner.token_grants.load(Ordering::SeqCst)
    }

    /// Bearer token presented on the most recent API request.
    pub fn last_bearer(&self) -> Option<String> {
        self.inner.last_bearer.lock().ok().and_then(|b| b.clone())
    }

    /// Query parameters of the most recent request.
    pub fn last_query(&self) -> Option<HashMap<String, String>> {
        self.inner.last_query.lock().ok().and_then(|q| q.clone())
    }

    fn decorate(&self, record: &mut Record, id: &str) {
        record.insert("kind".into(), Value::from("tasks#task"));
        record.insert("id".into(), Value::from(id));
        record.insert("etag".into(), Value::from(format!("\"{}\"", self.next_id("etag-"))));
        record.insert("updated".into(), Value::from(now()));
        record.insert(
            "selfLink".into(),
            Value::from(format!("https://tasks.invalid/tasks/{id}")),
        );
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/users/@me/lists", get(list_tasklists))
            .route("/lists/{tasklist}/tasks", get(list_tasks).post(insert_task))
            .route(
                "/lists/{tasklist}/tasks/{task}",
                get(get_task).put(update_task),
            );

        let api = api.layer(middleware::from_fn_with_state(self.clone(), gatekeeper));

        Router::new()
            .nest(API_PREFIX, api)
            .route(TOKEN_PATH, post(token_grant))
            .with_state(self.clone())
    }

    /// Serve on `127.0.0.1:<ephemeral>` until the returned handle drops.
    pub async fn spawn(self) -> std::io::Result<RunningBackend> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(RunningBackend {
            backend: self,
            addr,
            handle,
        })
    }
}

/// Count, record the query, enforce a bearer token, then apply any
/// injected failure.
async fn gatekeeper(State(backend): State<MockBackend>, request: Request, next: Next) -> Response {
    backend.inner.requests.fetch_add(1, Ordering::SeqCst);

    let query: HashMap<String, String> = request
        .uri()
        .query()
        .map(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    if let Ok(mut last) = backend.inner.last_query.lock() {
        *last = Some(query);
    }

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    let Some(bearer) = bearer else {
        return api_error(
            StatusCode::UNAUTHORIZED,
            "Request is missing required authentication credential.",
        );
    };
    if let Ok(mut last) = backend.inner.last_bearer.lock() {
        *last = Some(bearer);
    }

    let failure = backend.inner.failure.lock().ok().and_then(|f| f.clone());
    if let Some((status, message)) = failure {
        return api_error(status, &message);
    }

    next.run(request).await
}

/// Refresh-token grant: mints a new access token, never a new refresh token.
async fn token_grant(
    State(backend): State<MockBackend>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    backend.inner.token_grants.fetch_add(1, Ordering::SeqCst);

    if form.get("grant_type").map(String::as_str) != Some("refresh_token") {
        let body = json!({"error": "unsupported_grant_type"});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    match form.get("refresh_token").map(String::as_str) {
        None | Some("") | Some(REVOKED_REFRESH_TOKEN) => {
            let body = json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            });
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        Some(_) => Json(json!({
            "access_token": backend.next_id("mock-access-"),
            "token_type": "Bearer",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/tasks"
        }))
        .into_response(),
    }
}

fn page(kind: &str, items: Vec<Record>) -> Json<Value> {
    let mut body = json!({ "kind": kind, "etag": "\"page\"" });
    // The hosted service omits `items` for empty collections
    if !items.is_empty() {
        body["items"] = Value::from(items.into_iter().map(Value::Object).collect::<Vec<_>>());
    }
    Json(body)
}

async fn list_tasklists(State(backend): State<MockBackend>) -> Json<Value> {
    let db = backend.inner.db.read().await;
    page("tasks#taskLists", db.lists.clone())
}

async fn list_tasks(
    State(backend): State<MockBackend>,
    Path(tasklist): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let db = backend.inner.db.read().await;
    let Some(tasks) = db.tasks.get(&tasklist) else {
        return api_error(StatusCode::NOT_FOUND, "Task list not found.");
    };

    let show_completed = query.show_completed.unwrap_or(true);
    let show_hidden = query.show_hidden.unwrap_or(false);
    let limit = query.max_results.unwrap_or(100);

    let items = tasks
        .iter()
        .filter(|t| show_completed || t.get("status").and_then(Value::as_str) != Some("completed"))
        .filter(|t| show_hidden || !t.get("hidden").and_then(Value::as_bool).unwrap_or(false))
        .take(limit)
        .cloned()
        .collect();
    page("tasks#tasks", items).into_response()
}

async fn insert_task(
    State(backend): State<MockBackend>,
    Path(tasklist): Path<String>,
    Query(query): Query<InsertQuery>,
    Json(mut record): Json<Record>,
) -> Response {
    let mut db = backend.inner.db.write().await;
    let Some(tasks) = db.tasks.get_mut(&tasklist) else {
        return api_error(StatusCode::NOT_FOUND, "Task list not found.");
    };
    if let Some(parent) = &query.parent {
        let exists = tasks
            .iter()
            .any(|t| t.get("id").and_then(Value::as_str) == Some(parent.as_str()));
        if !exists {
            return api_error(StatusCode::NOT_FOUND, "Parent task not found.");
        }
        record.insert("parent".into(), Value::from(parent.as_str()));
    }

    let id = backend.next_id("task-");
    backend.decorate(&mut record, &id);
    record
        .entry("status")
        .or_insert_with(|| Value::from("needsAction"));
    tasks.push(record.clone());
    Json(record).into_response()
}

async fn get_task(
    State(backend): State<MockBackend>,
    Path((tasklist, task)): Path<(String, String)>,
) -> Response {
    match backend.task(&tasklist, &task).await {
        Some(record) => Json(record).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "Task not found."),
    }
}

async fn update_task(
    State(backend): State<MockBackend>,
    Path((tasklist, task)): Path<(String, String)>,
    Json(mut record): Json<Record>,
) -> Response {
    let mut db = backend.inner.db.write().await;
    let slot = db
        .tasks
        .get_mut(&tasklist)
        .and_then(|tasks| {
            tasks
                .iter_mut()
                .find(|t| t.get("id").and_then(Value::as_str) == Some(task.as_str()))
        });
    let Some(slot) = slot else {
        return api_error(StatusCode::NOT_FOUND, "Task not found.");
    };

    backend.decorate(&mut record, &task);
    *slot = record.clone();
    Json(record).into_response()
}
