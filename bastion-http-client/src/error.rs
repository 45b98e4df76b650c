//! HTTP client error types.

use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Message for requests that never received a response.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";
/// Message for status `0` responses.
pub const CORS_ERROR_MESSAGE: &str = "CORS error. Please check server configuration.";
/// Message for failures with no captured request to replay.
pub const NO_ORIGINAL_REQUEST_MESSAGE: &str = "No original request found.";
/// Message for `403 Forbidden` responses.
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Access denied. You do not have permission to perform this action.";
/// Message for calls abandoned because the client redirected to login.
pub const REDIRECTING_MESSAGE: &str = "Session expired. Redirecting to login.";

/// HTTP client errors.
///
/// The first six variants form the failure taxonomy of the client. They only
/// decide which message is shown and whether recovery is attempted; callers
/// of the verb methods observe all of them as a failed
/// [`ResponseEnvelope`](crate::ResponseEnvelope).
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The request never completed (connection refused, DNS, timeout).
    #[error("{}", NETWORK_ERROR_MESSAGE)]
    Network(String),

    /// The response carried status `0`.
    #[error("{}", CORS_ERROR_MESSAGE)]
    Cors,

    /// Authenticated but not authorized (`403`).
    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,

    /// A `401` that recovery could not resolve.
    #[error("{0}")]
    Unauthenticated(String),

    /// Any other non-2xx response.
    #[error("{message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Server-provided error, or the transport message.
        message: String,
    },

    /// A failure arrived without the request that caused it.
    #[error("{}", NO_ORIGINAL_REQUEST_MESSAGE)]
    MalformedRequestContext,

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The underlying reqwest client could not be built.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpClientError {
    /// Build a server error from a status and an optional server-provided message.
    pub fn server(status: u16, message: Option<String>) -> Self {
        Self::Server {
            status,
            message: message.unwrap_or_else(|| status_message(status)),
        }
    }

    /// Check if this error means no response was received.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if recovery could have been attempted for this error.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthenticated(_) | Self::PermissionDenied)
    }

    /// Get the HTTP status code if the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Cors => Some(0),
            Self::PermissionDenied => Some(403),
            Self::Unauthenticated(_) => Some(401),
            Self::Server { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HttpClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Transport message used when the server body has no `error` field.
pub(crate) fn status_message(status: u16) -> String {
    format!("Request failed with status code {}", status)
}
