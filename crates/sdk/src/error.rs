//! Error types for the toolmesh SDK.

use serde::{Deserialize, Serialize};
use toolmesh_core::TransportError;

/// Result type for SDK operations.
pub type ToolmeshResult<T> = Result<T, ToolmeshError>;

/// Error types that can occur when talking to a toolmesh node.
#[derive(Debug, thiserror::Error)]
pub enum ToolmeshError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Node returned an error response.
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<String>,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection timeout.
    #[error("Request timed out")]
    Timeout,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Remote tool returned a JSON-RPC error.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ToolmeshError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Create an API error from a status code and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        if status == 404 {
            let message = serde_json::from_str::<ErrorResponse>(body)
                .map(|r| r.error)
                .unwrap_or_else(|_| body.to_string());
            return Self::NotFound(message);
        }

        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(error_response) => Self::Api {
                status,
                message: error_response.error,
                details: error_response.details,
            },
            Err(_) => Self::Api {
                status,
                message: body.to_string(),
                details: None,
            },
        }
    }
}

/// Peer-transport view of an SDK failure
impl From<ToolmeshError> for TransportError {
    fn from(err: ToolmeshError) -> Self {
        match err {
            ToolmeshError::Timeout => TransportError::Timeout(0),
            ToolmeshError::Http(e) if e.is_timeout() => TransportError::Timeout(0),
            ToolmeshError::Http(e) if e.is_decode() => TransportError::InvalidResponse(e.to_string()),
            ToolmeshError::Http(e) => TransportError::Connection(e.to_string()),
            ToolmeshError::Json(e) => TransportError::InvalidResponse(e.to_string()),
            ToolmeshError::InvalidUrl(e) => TransportError::Connection(e.to_string()),
            ToolmeshError::Config(message) => TransportError::Connection(message),
            other => TransportError::Remote(other.to_string()),
        }
    }
}

/// Error response body returned by a toolmesh node.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
