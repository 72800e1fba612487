//! # Client Error Types
//!
//! The closed error taxonomy every task operation reports through, and the
//! classifier that maps backend failures onto it.
//!
//! Callers pick a recovery strategy from the variant alone:
//!
//! | Variant | Guidance |
//! |---|---|
//! | [`GTasksError::Validation`] | fix the input; the backend was never called |
//! | [`GTasksError::Authentication`] | re-provision client identity or re-consent |
//! | [`GTasksError::Api`] | see [`ApiErrorKind`] |
//! | [`GTasksError::Unexpected`] | logged at the failure site, surfaced unchanged |

use thiserror::Error;
use tracing::error;

/// Boxed cause attached to taxonomy members.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Client operation result type
pub type GTasksResult<T> = Result<T, GTasksError>;

/// Sub-classification of backend errors that are not authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 404: the list or task does not exist. Do not retry.
    NotFound,
    /// 429: retry after backoff.
    RateLimited,
    /// 5xx: retry with backoff.
    Unavailable,
    /// Any other status. Surface as-is.
    Generic,
}

impl ApiErrorKind {
    /// Stable snake_case code used on the host surface.
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Generic => "api_error",
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "resource not found"),
            Self::RateLimited => write!(f, "rate limit exceeded, try again later"),
            Self::Unavailable => write!(f, "backend temporarily unavailable"),
            Self::Generic => write!(f, "backend error"),
        }
    }
}

/// Failure of a single backend call, before classification.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// HTTP status code when the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The closed taxonomy surfaced by every task operation.
#[derive(Debug, Error)]
pub enum GTasksError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// The offending input, verbatim.
        input: String,
    },

    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{kind} during {context}: {source}")]
    Api {
        kind: ApiErrorKind,
        context: String,
        status: u16,
        #[source]
        source: BackendError,
    },

    #[error("Unexpected error during {context}: {source}")]
    Unexpected {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Startup configuration failure; never produced by an operation.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GTasksError {
    /// Create a validation error carrying the offending input.
    pub fn validation(message: impl Into<String>, input: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            input: input.into(),
        }
    }

    /// Create an authentication error without an underlying cause.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Create an authentication error wrapping its cause.
    pub fn authentication_from(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an unexpected error. Logs the full cause before returning.
    pub fn unexpected(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        let context = context.into();
        let source = source.into();
        error!(operation = %context, error = ?source, "Unexpected error");
        Self::Unexpected { context, source }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable snake_case code for the host surface.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Authentication { .. } => "authentication_error",
            Self::Api { kind, .. } => kind.code(),
            Self::Unexpected { .. } => "unexpected_error",
            Self::Config(_) => "config_error",
        }
    }

    /// Check if the error is worth retrying after backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api {
                kind: ApiErrorKind::RateLimited | ApiErrorKind::Unavailable,
                ..
            }
        )
    }

    /// Check if an operator must re-provision credentials or re-consent
    #[must_use]
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

/// Map an HTTP status onto the taxonomy. Total over all status codes.
fn kind_for_status(status: u16) -> Option<ApiErrorKind> {
    match status {
        401 | 403 => None,
        404 => Some(ApiErrorKind::NotFound),
        429 => Some(ApiErrorKind::RateLimited),
        s if s >= 500 => Some(ApiErrorKind::Unavailable),
        _ => Some(ApiErrorKind::Generic),
    }
}

/// Classify a failed backend call made while running `context`.
///
/// Status-bearing failures map onto [`GTasksError::Authentication`] or
/// [`GTasksError::Api`]. Everything else becomes [`GTasksError::Unexpected`]
/// and is logged here with full detail.
pub fn classify(error: BackendError, context: &str) -> GTasksError {
    let Some(status) = error.status() else {
        return GTasksError::unexpected(context, error);
    };

    match kind_for_status(status) {
        None => GTasksError::authentication_from(
            format!(
                "backend rejected credentials during {context} (HTTP {status}); \
                 re-authenticate with `gtasks-mcp --auth`"
            ),
            error,
        ),
        Some(kind) => GTasksError::Api {
            kind,
            context: context.to_string(),
            status,
            source: error,
        },
    }
}
