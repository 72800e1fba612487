//! # gtasks-client
//!
//! Client library for a hosted task backend: credential lifecycle, the
//! error taxonomy, input validation, response sanitization and the five
//! task operations built on them.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gtasks_client::{ClientConfig, CredentialManager, TaskOperations};
//!
//! # async fn run() -> gtasks_client::GTasksResult<()> {
//! let config = ClientConfig::load()?;
//! let ops = TaskOperations::new(Arc::new(CredentialManager::new(config)?));
//! for list in ops.get_lists().await? {
//!     println!("{} ({})", list.title, list.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod operations;
pub mod sanitize;
pub mod validation;

pub use client::{ListTasksQuery, TaskRecord, TasksClient};
pub use config::ClientConfig;
pub use credentials::{
    Authorizer, ClientIdentity, Credential, CredentialManager, CredentialState, CredentialStore,
    OAuthAuthorizer,
};
pub use error::{ApiErrorKind, BackendError, GTasksError, GTasksResult};
pub use operations::{CreateTaskRequest, ListTasksRequest, TaskOperations};
pub use sanitize::{TaskListView, TaskView};
