// Outbound network seam: liveness probes, gossip exchange and tool forwarding

use crate::error::TransportError;
use crate::types::GossipMessage;
use std::future::Future;
use std::time::Duration;

/// Outbound transport to other federated servers.
///
/// Implementations do not need to enforce timeouts themselves; every call
/// site wraps them in [`bounded`].
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Liveness probe
    async fn ping(&self, endpoint: &str) -> Result<(), TransportError>;

    /// Send our view and receive the peer's in one round trip
    async fn exchange_gossip(
        &self,
        endpoint: &str,
        message: &GossipMessage,
    ) -> Result<GossipMessage, TransportError>;

    /// Invoke a tool hosted at `endpoint`
    async fn call_tool(
        &self,
        endpoint: &str,
        tool: &str,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError>;
}

/// Run a transport future with a deadline; expiry becomes [`TransportError::Timeout`]
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockTransport;

#[cfg(any(test, feature = "test-util"))]
mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Mutex, MutexGuard};

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scriptable in-memory transport.
    ///
    /// Every endpoint is reachable unless marked down. Tool calls echo their
    /// params unless a result was scripted for the endpoint/tool pair.
    #[derive(Default)]
    pub struct MockTransport {
        down: Mutex<HashSet<String>>,
        delays: Mutex<HashMap<String, Duration>>,
        gossip_replies: Mutex<HashMap<String, GossipMessage>>,
        gossip_received: Mutex<Vec<(String, GossipMessage)>>,
        tool_results: Mutex<HashMap<(String, String), Result<serde_json::Value, TransportError>>>,
        pings: Mutex<HashMap<String, usize>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_down(&self, endpoint: &str) {
            lock(&self.down).insert(endpoint.to_string());
        }

        pub fn set_up(&self, endpoint: &str) {
            lock(&self.down).remove(endpoint);
        }

        /// Delay every request to `endpoint`
        pub fn set_delay(&self, endpoint: &str, delay: Duration) {
            lock(&self.delays).insert(endpoint.to_string(), delay);
        }

        pub fn set_gossip_reply(&self, endpoint: &str, reply: GossipMessage) {
            lock(&self.gossip_replies).insert(endpoint.to_string(), reply);
        }

        pub fn set_tool_result(
            &self,
            endpoint: &str,
            tool: &str,
            result: Result<serde_json::Value, TransportError>,
        ) {
            lock(&self.tool_results).insert((endpoint.to_string(), tool.to_string()), result);
        }

        pub fn ping_count(&self, endpoint: &str) -> usize {
            lock(&self.pings).get(endpoint).copied().unwrap_or(0)
        }

        pub fn call_count(&self, endpoint: &str) -> usize {
            lock(&self.calls).get(endpoint).copied().unwrap_or(0)
        }

        /// Gossip messages this transport delivered, with their target endpoint
        pub fn gossip_received(&self) -> Vec<(String, GossipMessage)> {
            lock(&self.gossip_received).clone()
        }

        async fn simulate(&self, endpoint: &str) -> Result<(), TransportError> {
            let delay = lock(&self.delays).get(endpoint).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if lock(&self.down).contains(endpoint) {
                return Err(TransportError::Connection(format!("{} is down", endpoint)));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl PeerTransport for MockTransport {
        async fn ping(&self, endpoint: &str) -> Result<(), TransportError> {
            *lock(&self.pings).entry(endpoint.to_string()).or_default() += 1;
            self.simulate(endpoint).await
        }

        async fn exchange_gossip(
            &self,
            endpoint: &str,
            message: &GossipMessage,
        ) -> Result<GossipMessage, TransportError> {
            self.simulate(endpoint).await?;
            lock(&self.gossip_received).push((endpoint.to_string(), message.clone()));
            Ok(lock(&self.gossip_replies)
                .get(endpoint)
                .cloned()
                .unwrap_or_default())
        }

        async fn call_tool(
            &self,
            endpoint: &str,
            tool: &str,
            params: &serde_json::Value,
        ) -> Result<serde_json::Value, TransportError> {
            *lock(&self.calls).entry(endpoint.to_string()).or_default() += 1;
            self.simulate(endpoint).await?;
            let scripted = lock(&self.tool_results)
                .get(&(endpoint.to_string(), tool.to_string()))
                .cloned();
            match scripted {
                Some(result) => result,
                None => Ok(serde_json::json!({ "tool": tool, "echo": params })),
            }
        }
    }
}
