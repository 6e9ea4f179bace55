//! Error types for federation operations.

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;

/// Errors raised by the registry and the components built on it.
///
/// Policy failures (`TrustTooLow`, `ToolNotFound`, ...) never cross the
/// forwarding API as errors; the gateway turns them into
/// [`ToolCallResult`](crate::types::ToolCallResult) data.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// Registration input failed validation.
    #[error("Invalid server: {0}")]
    InvalidServer(String),

    /// Audit findings outside their valid range.
    #[error("Invalid audit: {0}")]
    InvalidAudit(String),

    /// A server with this id is already known.
    #[error("Server already registered: {0}")]
    AlreadyRegistered(String),

    /// The liveness probe against the endpoint failed.
    #[error("Server unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("server not found: {0}")]
    ServerNotFound(String),

    #[error("trust score too low: {trust:.1} below minimum trust threshold {required:.1}")]
    TrustTooLow {
        server_id: String,
        trust: f64,
        required: f64,
    },

    #[error("tool not found: {tool} on {server_id}")]
    ToolNotFound { server_id: String, tool: String },

    #[error("No servers found for tool {0}")]
    NoServersFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl FederationError {
    /// Whether the caller supplied bad input (as opposed to a runtime failure).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidServer(_) | Self::InvalidAudit(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ServerNotFound(_) | Self::ToolNotFound { .. } | Self::NoServersFound(_)
        )
    }
}

/// Errors from the outbound peer transport. Every one of these is a normal
/// outcome for probes and gossip and is recorded as metric signal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connection(String),

    /// The peer answered, but with an error.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
