//! Credential lifecycle: the persisted token record, the client identity
//! used to mint it, and the manager that turns them into a usable
//! [`TasksClient`](crate::TasksClient).

mod authorizer;
mod callback;
mod manager;
mod store;

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GTasksError, GTasksResult};

pub use authorizer::{Authorizer, OAuthAuthorizer};
pub use callback::{AuthorizationCallback, CallbackListener};
pub use manager::{CredentialManager, CredentialState};
pub use store::CredentialStore;

/// A credential within this margin of its expiry is treated as expired.
pub const EXPIRY_SKEW: TimeDelta = TimeDelta::seconds(60);

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Token material authorizing backend calls on the user's behalf.
///
/// Owned by the [`CredentialManager`]; the [`CredentialStore`] only
/// serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    #[serde(
        alias = "token",
        serialize_with = "expose_secret",
        deserialize_with = "secret_from_string"
    )]
    pub access_token: SecretString,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "expose_optional_secret",
        deserialize_with = "optional_secret_from_string"
    )]
    pub refresh_token: Option<SecretString>,
    pub expiry: DateTime<Utc>,
    #[serde(
        alias = "scope",
        default,
        deserialize_with = "scopes_from_list_or_string"
    )]
    pub scopes: BTreeSet<String>,
    /// Client that minted the token. With `token_uri` it lets the record
    /// refresh without the client identity file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "expose_optional_secret",
        deserialize_with = "optional_secret_from_string"
    )]
    pub client_secret: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: DateTime<Utc>,
        scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: refresh_token.map(SecretString::from),
            expiry,
            scopes: scopes.into_iter().collect(),
            client_id: None,
            client_secret: None,
            token_uri: None,
        }
    }

    /// Stamp the client that minted this credential onto the record.
    pub fn with_identity(mut self, identity: &ClientIdentity) -> Self {
        self.client_id = Some(identity.client_id.clone());
        self.client_secret = identity.client_secret.clone();
        self.token_uri = Some(identity.token_uri.clone());
        self
    }

    /// Client identity carried by the record itself, if it names a client.
    pub fn embedded_identity(&self) -> Option<ClientIdentity> {
        let client_id = self.client_id.as_ref().filter(|id| !id.is_empty())?;
        Some(ClientIdentity {
            client_id: client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_uri: default_auth_uri(),
            token_uri: self
                .token_uri
                .clone()
                .unwrap_or_else(default_token_uri),
        })
    }

    /// True once `now` is within [`EXPIRY_SKEW`] of the expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + EXPIRY_SKEW >= self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// True if every `required` scope was granted.
    pub fn covers_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|s| self.scopes.contains(s))
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.as_ref().map(ExposeSecret::expose_secret)
                == other.refresh_token.as_ref().map(ExposeSecret::expose_secret)
            && self.expiry == other.expiry
            && self.scopes == other.scopes
            && self.client_id == other.client_id
            && self.client_secret.as_ref().map(ExposeSecret::expose_secret)
                == other.client_secret.as_ref().map(ExposeSecret::expose_secret)
            && self.token_uri == other.token_uri
    }
}

fn expose_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn expose_optional_secret<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn secret_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn optional_secret_from_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Accept `["a", "b"]` as well as the space-delimited `"a b"` that token
/// endpoints return.
fn scopes_from_list_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeSet<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        List(Vec<String>),
        Delimited(String),
    }

    Ok(match Scopes::deserialize(deserializer)? {
        Scopes::List(list) => list.into_iter().collect(),
        Scopes::Delimited(s) => s.split_whitespace().map(str::to_string).collect(),
    })
}

/// OAuth client identity, as issued by the provider's developer console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    #[serde(default, deserialize_with = "optional_secret_from_string")]
    pub client_secret: Option<SecretString>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientIdentity {
    /// Load the identity file. Absence is terminal: refresh cannot recover it.
    pub fn load(path: &Path) -> GTasksResult<Self> {
        if !path.exists() {
            return Err(GTasksError::authentication(format!(
                "client identity file not found at {}. Download OAuth client \
                 credentials (desktop app) from the provider console.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GTasksError::authentication_from(
                format!("could not read client identity file {}", path.display()),
                e,
            )
        })?;
        Self::from_json(&content).map_err(|e| {
            GTasksError::authentication_from(
                format!("malformed client identity file {}", path.display()),
                e,
            )
        })
    }

    /// Parse either the console's `{"installed": {...}}` / `{"web": {...}}`
    /// wrapper or a flat object.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(content)?;
        let inner = ["installed", "web"]
            .iter()
            .find_map(|key| value.get_mut(*key).map(serde_json::Value::take));
        Self::deserialize(inner.unwrap_or(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(expiry: DateTime<Utc>) -> Credential {
        Credential::new(
            "ya29.access",
            Some("1//refresh".to_string()),
            expiry,
            ["https://www.googleapis.com/auth/tasks".to_string()],
        )
    }

    #[test]
    fn test_expiry_with_skew() {
        let expiry = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let credential = sample(expiry);
        assert!(!credential.is_expired_at(expiry - TimeDelta::minutes(5)));
        assert!(credential.is_expired_at(expiry - TimeDelta::seconds(30)));
        assert!(credential.is_expired_at(expiry + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_json_roundtrip_exposes_tokens_to_file_only() {
        let credential = sample(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        let json = serde_json::to_string(&credential).unwrap();
        assert!(json.contains("ya29.access"));
        assert!(json.contains("1//refresh"));

        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, credential);

        let debug = format!("{credential:?}");
        assert!(!debug.contains("ya29.access"));
        assert!(!debug.contains("1//refresh"));
    }

    #[test]
    fn test_accepts_token_alias_and_delimited_scopes() {
        let json = r#"{
            "token": "abc",
            "expiry": "2030-01-01T00:00:00.123456Z",
            "scopes": "https://www.googleapis.com/auth/tasks openid"
        }"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.access_token.expose_secret(), "abc");
        assert!(!credential.has_refresh_token());
        assert_eq!(credential.scopes.len(), 2);
    }

    #[test]
    fn test_authorized_user_file_carries_identity() {
        let json = r#"{
            "token": "ya29.stale",
            "refresh_token": "1//refresh",
            "token_uri": "https://auth.example.com/token",
            "client_id": "123.apps.example.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/tasks"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2024-05-01T12:00:00.123456Z"
        }"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert!(credential.has_refresh_token());

        let identity = credential.embedded_identity().unwrap();
        assert_eq!(identity.client_id, "123.apps.example.com");
        assert_eq!(
            identity.client_secret.as_ref().map(|s| s.expose_secret()),
            Some("shh")
        );
        assert_eq!(identity.token_uri, "https://auth.example.com/token");
        assert_eq!(identity.auth_uri, DEFAULT_AUTH_URI);
    }

    #[test]
    fn test_identity_stamp_survives_roundtrip() {
        let identity = ClientIdentity::from_json(
            r#"{"client_id": "abc", "client_secret": "shh", "token_uri": "http://127.0.0.1:1/token"}"#,
        )
        .unwrap();
        let credential = sample(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
            .with_identity(&identity);

        let json = serde_json::to_string(&credential).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, credential);
        assert_eq!(back.token_uri.as_deref(), Some("http://127.0.0.1:1/token"));
        assert!(!format!("{back:?}").contains("shh"));
    }

    #[test]
    fn test_record_without_client_has_no_embedded_identity() {
        let credential = sample(Utc::now());
        assert!(credential.embedded_identity().is_none());
        let json = serde_json::to_string(&credential).unwrap();
        assert!(!json.contains("client_id"));
    }

    #[test]
    fn test_scope_coverage() {
        let credential = sample(Utc::now());
        assert!(credential.covers_scopes(&["https://www.googleapis.com/auth/tasks".to_string()]));
        assert!(!credential.covers_scopes(&["openid".to_string()]));
        assert!(credential.covers_scopes(&[]));
    }

    #[test]
    fn test_identity_installed_wrapper() {
        let json = r#"{"installed": {
            "client_id": "123.apps.example.com",
            "client_secret": "shh",
            "auth_uri": "https://auth.example.com/o/oauth2/auth",
            "token_uri": "https://auth.example.com/token",
            "redirect_uris": ["http://localhost"]
        }}"#;
        let identity = ClientIdentity::from_json(json).unwrap();
        assert_eq!(identity.client_id, "123.apps.example.com");
        assert_eq!(
            identity.client_secret.as_ref().map(|s| s.expose_secret()),
            Some("shh")
        );
        assert_eq!(identity.token_uri, "https://auth.example.com/token");
    }

    #[test]
    fn test_identity_flat_with_defaults() {
        let identity = ClientIdentity::from_json(r#"{"client_id": "abc"}"#).unwrap();
        assert!(identity.client_secret.is_none());
        assert_eq!(identity.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(identity.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_identity_missing_file_is_authentication_error() {
        let err = ClientIdentity::load(Path::new("/nonexistent/credentials.json")).unwrap_err();
        assert!(err.requires_reauthentication());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_identity_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ClientIdentity::load(&path).unwrap_err();
        assert!(err.requires_reauthentication());
        assert!(err.to_string().contains("malformed"));
    }
}
