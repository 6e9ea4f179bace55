//! Configuration types for the toolmesh SDK.

use std::time::Duration;
use toolmesh_core::FederationConfig;
use url::Url;

const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for the client of one node's HTTP API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the node.
    pub base_url: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_CLIENT_TIMEOUT,
            user_agent: format!("toolmesh-sdk/{}", env!("CARGO_PKG_VERSION")),
            retry_config: RetryConfig::default(),
        }
    }
}

/// Configuration for the transport a node uses to probe, gossip with and
/// forward calls to other servers.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// This node's id, announced in the `User-Agent` of outbound requests.
    pub node_id: String,
    /// Upper bound for one request to a peer.
    pub request_timeout: Duration,
    /// Upper bound for establishing a connection to a peer.
    pub connect_timeout: Duration,
    /// Retries per peer request; none by default.
    pub retry_config: RetryConfig,
}

impl PeerConfig {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            request_timeout: DEFAULT_PEER_TIMEOUT,
            connect_timeout: DEFAULT_PEER_CONNECT_TIMEOUT,
            retry_config: RetryConfig::no_retry(),
        }
    }

    /// Peer timeouts following the node's federation policy. The connect
    /// timeout never exceeds the request timeout.
    pub fn from_federation(node_id: impl Into<String>, federation: &FederationConfig) -> Self {
        let request_timeout = federation.request_timeout();
        Self {
            request_timeout,
            connect_timeout: request_timeout.min(DEFAULT_PEER_CONNECT_TIMEOUT),
            ..Self::new(node_id)
        }
    }

    pub fn user_agent(&self) -> String {
        format!("toolmesh/{} (node {})", env!("CARGO_PKG_VERSION"), self.node_id)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries.
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// HTTP status codes to retry on.
    pub retry_on_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retry_on_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for a given attempt.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        std::cmp::min(backoff, self.max_backoff)
    }

    /// Check if a status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status_codes.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_capped() {
        let config = RetryConfig {
            max_backoff: Duration::from_millis(500),
            ..Default::default()
        };

        assert_eq!(config.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.backoff_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_gateway_errors_are_retried() {
        let config = RetryConfig::default();

        assert!(config.should_retry_status(502));
        assert!(config.should_retry_status(429));
        assert!(!config.should_retry_status(409));
        assert!(!config.should_retry_status(404));
    }

    #[test]
    fn test_client_config_defaults() {
        let url = Url::parse("https://node.example.com").unwrap();
        let config = ClientConfig::new(url.clone());

        assert_eq!(config.base_url, url);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("toolmesh-sdk/"));
        assert_eq!(config.retry_config.max_retries, 3);
    }

    #[test]
    fn test_peer_config_follows_federation_timeout() {
        let tight = FederationConfig {
            request_timeout_ms: 750,
            ..FederationConfig::default()
        };
        let config = PeerConfig::from_federation("node-7", &tight);

        assert_eq!(config.request_timeout, Duration::from_millis(750));
        assert_eq!(config.connect_timeout, Duration::from_millis(750));
        assert_eq!(config.retry_config.max_retries, 0);
        assert!(config.user_agent().ends_with("(node node-7)"));

        let relaxed = PeerConfig::from_federation("node-7", &FederationConfig::default());
        assert_eq!(relaxed.connect_timeout, DEFAULT_PEER_CONNECT_TIMEOUT);
    }
}
