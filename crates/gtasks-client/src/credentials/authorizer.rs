//! Token minting: refresh grants and interactive consent.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use super::callback::CallbackListener;
use super::{ClientIdentity, Credential};
use crate::config::ClientConfig;
use crate::error::{GTasksError, GTasksResult};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

type ProviderClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Source of fresh credentials for the [`CredentialManager`](super::CredentialManager).
#[async_trait]
pub trait Authorizer: Send + Sync + std::fmt::Debug {
    /// Exchange the credential's refresh token for a new access token.
    async fn refresh(
        &self,
        identity: &ClientIdentity,
        credential: &Credential,
    ) -> GTasksResult<Credential>;

    /// Run the interactive consent flow for `scopes`.
    async fn authorize(
        &self,
        identity: &ClientIdentity,
        scopes: &[String],
    ) -> GTasksResult<Credential>;
}

/// Authorization-code flow with PKCE against the identity's endpoints,
/// receiving the redirect on a loopback listener.
#[derive(Debug, Clone)]
pub struct OAuthAuthorizer {
    http: reqwest::Client,
    consent_timeout: Duration,
    open_browser: bool,
}

impl OAuthAuthorizer {
    pub fn new(consent_timeout: Duration, open_browser: bool) -> GTasksResult<Self> {
        // Token endpoints must not be followed through redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GTasksError::unexpected("oauth_http_client", e))?;
        Ok(Self {
            http,
            consent_timeout,
            open_browser,
        })
    }

    pub fn from_config(config: &ClientConfig) -> GTasksResult<Self> {
        Self::new(config.consent_timeout(), config.open_browser)
    }

    fn client(identity: &ClientIdentity) -> GTasksResult<ProviderClient> {
        let auth_url = AuthUrl::new(identity.auth_uri.clone()).map_err(|e| {
            GTasksError::authentication_from(format!("invalid auth_uri '{}'", identity.auth_uri), e)
        })?;
        let token_url = TokenUrl::new(identity.token_uri.clone()).map_err(|e| {
            GTasksError::authentication_from(
                format!("invalid token_uri '{}'", identity.token_uri),
                e,
            )
        })?;

        let mut client = BasicClient::new(ClientId::new(identity.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);
        if let Some(secret) = &identity.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.expose_secret().to_string()));
        }
        Ok(client)
    }
}

#[async_trait]
impl Authorizer for OAuthAuthorizer {
    async fn refresh(
        &self,
        identity: &ClientIdentity,
        credential: &Credential,
    ) -> GTasksResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_ref()
            .ok_or_else(|| GTasksError::authentication("credential has no refresh token"))?;

        let token = Self::client(identity)?
            .exchange_refresh_token(&RefreshToken::new(
                refresh_token.expose_secret().to_string(),
            ))
            .request_async(&self.http)
            .await
            .map_err(|e| GTasksError::authentication_from("token refresh was rejected", e))?;

        let requested: Vec<String> = credential.scopes.iter().cloned().collect();
        let mut refreshed = credential_from_token(&token, &requested).with_identity(identity);
        // Providers usually omit the refresh token on refresh; keep the old one
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token.clone());
        }
        info!("Access token refreshed");
        Ok(refreshed)
    }

    async fn authorize(
        &self,
        identity: &ClientIdentity,
        scopes: &[String],
    ) -> GTasksResult<Credential> {
        let listener = CallbackListener::bind().await?;
        let redirect = RedirectUrl::new(listener.redirect_uri())
            .map_err(|e| GTasksError::authentication_from("invalid redirect URI", e))?;
        let client = Self::client(identity)?.set_redirect_uri(redirect);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        info!(url = %auth_url, "Open this URL in a browser to grant access");
        if self.open_browser {
            if let Err(e) = open::that(auth_url.as_str()) {
                warn!(error = %e, "Could not launch a browser; open the URL manually");
            }
        }

        let code = listener
            .wait(self.consent_timeout)
            .await?
            .into_code(csrf_state.secret())?;

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| {
                GTasksError::authentication_from("authorization code exchange failed", e)
            })?;

        info!("Interactive authorization complete");
        Ok(credential_from_token(&token, scopes).with_identity(identity))
    }
}

/// Build a credential from a token response. Scopes fall back to the
/// requested set when the endpoint does not echo them.
fn credential_from_token(token: &BasicTokenResponse, requested_scopes: &[String]) -> Credential {
    let lifetime = token.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
    let expiry = Utc::now() + TimeDelta::from_std(lifetime).unwrap_or(TimeDelta::hours(1));

    let scopes: Vec<String> = match token.scopes() {
        Some(granted) => granted.iter().map(|s| s.as_str().to_owned()).collect(),
        None => requested_scopes.to_vec(),
    };

    Credential::new(
        token.access_token().secret().clone(),
        token.refresh_token().map(|t| t.secret().clone()),
        expiry,
        scopes,
    )
}
