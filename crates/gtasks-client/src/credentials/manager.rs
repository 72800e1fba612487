//! Lazily establishes the authorized [`TasksClient`], at most once per
//! process.
//!
//! Acquisition is a linear walk: stored credential, then refresh, then
//! interactive consent. Each step reports a [`CredentialState`] and the
//! walk stops at the first `Ready` or `Fatal`. Concurrent first callers
//! share a single acquisition; a failed acquisition leaves the slot empty so
//! the next call starts over.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::authorizer::{Authorizer, OAuthAuthorizer};
use super::store::CredentialStore;
use super::{ClientIdentity, Credential};
use crate::client::TasksClient;
use crate::config::ClientConfig;
use crate::error::{GTasksError, GTasksResult};

/// Outcome of one acquisition step.
#[derive(Debug)]
pub enum CredentialState {
    /// Usable as-is.
    Ready(Credential),
    /// Scopes match but the access token lapsed; a refresh token is available.
    Expired(Credential),
    /// Only interactive consent can produce a credential.
    NeedsInteractive,
    /// No step can recover.
    Fatal(GTasksError),
}

/// Owner of the process-wide client handle.
#[derive(Debug)]
pub struct CredentialManager {
    config: ClientConfig,
    store: CredentialStore,
    authorizer: Arc<dyn Authorizer>,
    handle: OnceCell<TasksClient>,
}

impl CredentialManager {
    /// Manager using the provider's OAuth flow.
    pub fn new(config: ClientConfig) -> GTasksResult<Self> {
        let authorizer = OAuthAuthorizer::from_config(&config)?;
        Ok(Self::with_authorizer(config, Arc::new(authorizer)))
    }

    pub fn with_authorizer(config: ClientConfig, authorizer: Arc<dyn Authorizer>) -> Self {
        let store = CredentialStore::new(config.token_path.clone());
        Self {
            config,
            store,
            authorizer,
            handle: OnceCell::new(),
        }
    }

    /// Manager that already holds an established handle.
    pub fn with_handle(
        config: ClientConfig,
        authorizer: Arc<dyn Authorizer>,
        handle: TasksClient,
    ) -> Self {
        let manager = Self::with_authorizer(config, authorizer);
        // A fresh cell cannot already be set
        let _ = manager.handle.set(handle);
        manager
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_established(&self) -> bool {
        self.handle.initialized()
    }

    /// Return the process-wide handle, establishing it on first use.
    pub async fn acquire(&self) -> GTasksResult<TasksClient> {
        self.handle
            .get_or_try_init(|| self.establish())
            .await
            .cloned()
    }

    async fn establish(&self) -> GTasksResult<TasksClient> {
        let credential = self.resolve_credential().await?;
        TasksClient::new(
            &self.config.api_base_url,
            credential.access_token,
            self.config.request_timeout(),
        )
    }

    async fn resolve_credential(&self) -> GTasksResult<Credential> {
        let mut state = self.load_stored();
        loop {
            state = match state {
                CredentialState::Ready(credential) => return Ok(credential),
                CredentialState::Fatal(e) => return Err(e),
                CredentialState::Expired(stale) => self.refresh(&stale).await,
                CredentialState::NeedsInteractive => self.interactive().await,
            };
        }
    }

    /// Step 1: classify the stored credential.
    fn load_stored(&self) -> CredentialState {
        let Some(credential) = self.store.load() else {
            return CredentialState::NeedsInteractive;
        };

        if !credential.covers_scopes(&self.config.scopes) {
            info!(
                required = ?self.config.scopes,
                granted = ?credential.scopes,
                "Stored credential lacks required scopes; re-consent needed"
            );
            return CredentialState::NeedsInteractive;
        }
        if !credential.is_expired() {
            debug!("Stored credential is valid");
            return CredentialState::Ready(credential);
        }
        if credential.has_refresh_token() {
            debug!("Stored credential expired; attempting refresh");
            CredentialState::Expired(credential)
        } else {
            debug!("Stored credential expired without a refresh token");
            CredentialState::NeedsInteractive
        }
    }

    /// Step 2: refresh an expired credential and persist the result.
    ///
    /// Never returns `Expired` or `Fatal`: any failure defers to consent.
    async fn refresh(&self, stale: &Credential) -> CredentialState {
        let Some(identity) = self.refresh_identity(stale) else {
            return CredentialState::NeedsInteractive;
        };

        match self.authorizer.refresh(&identity, stale).await {
            Ok(fresh) => {
                self.store.save(&fresh);
                CredentialState::Ready(fresh)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed; falling back to interactive consent");
                CredentialState::NeedsInteractive
            }
        }
    }

    /// The client named in the stored record, else the identity file.
    fn refresh_identity(&self, stale: &Credential) -> Option<ClientIdentity> {
        if let Some(identity) = stale.embedded_identity() {
            debug!(
                client_id = %identity.client_id,
                "Refreshing with the client stored in the credential"
            );
            return Some(identity);
        }
        match ClientIdentity::load(&self.config.client_secrets_path) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Cannot refresh without client identity");
                None
            }
        }
    }

    /// Step 3: interactive consent. Terminal either way.
    async fn interactive(&self) -> CredentialState {
        let identity = match ClientIdentity::load(&self.config.client_secrets_path) {
            Ok(identity) => identity,
            Err(e) => return CredentialState::Fatal(e),
        };

        info!("Starting interactive authorization");
        match self
            .authorizer
            .authorize(&identity, &self.config.scopes)
            .await
        {
            Ok(credential) => {
                self.store.save(&credential);
                CredentialState::Ready(credential)
            }
            Err(e) => CredentialState::Fatal(e),
        }
    }
}
