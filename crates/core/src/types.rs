use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the `metadata`/`capabilities` wire schema
pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// A peer known to this node, together with the tools it advertises.
///
/// Serialized in camelCase because records travel between nodes in gossip
/// and registration payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedServer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub endpoint: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    pub owner: String,
    #[serde(default)]
    pub tools: Vec<FederatedTool>,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Locally earned reputation, always within [0, 100]
    #[serde(default)]
    pub trust_score: f64,
    #[serde(default)]
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ServerMetadata,
}

fn default_protocol_version() -> String {
    "1.0".to_string()
}

impl FederatedServer {
    /// Look up a tool in this server's catalog
    pub fn tool(&self, name: &str) -> Option<&FederatedTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tool(name).is_some()
    }

    /// Whether at least one tool belongs to `category`
    pub fn has_category(&self, category: &str) -> bool {
        self.tools
            .iter()
            .any(|t| t.category.eq_ignore_ascii_case(category))
    }
}

/// A callable capability advertised by a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_schema")]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub category: String,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

impl FederatedTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: default_input_schema(),
            category: category.into(),
        }
    }
}

/// Advertised (never verified) server capabilities.
///
/// Fields this version does not understand are kept in `extra` so they
/// survive a gossip round trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub batching: bool,
    #[serde(default)]
    pub webhooks: bool,
    #[serde(default)]
    pub custom_auth: bool,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,
    #[serde(default)]
    pub auth_methods: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_max_concurrent_requests() -> u32 {
    10
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            streaming: false,
            batching: false,
            webhooks: false,
            custom_auth: false,
            max_concurrent_requests: default_max_concurrent_requests(),
            auth_methods: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Free-form server metadata. Revenue share and the usage trust floor are
/// carried for callers and never interpreted by this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_share_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_trust_required: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_schema_version() -> u32 {
    METADATA_SCHEMA_VERSION
}

impl Default for ServerMetadata {
    fn default() -> Self {
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            version: None,
            region: None,
            tags: Vec::new(),
            revenue_share_percent: None,
            min_trust_required: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Behavioral substrate of one server's trust score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustMetrics {
    /// Percentage, 0-100
    pub uptime: f64,
    pub avg_response_time_ms: f64,
    /// Percentage, 0-100
    pub success_rate: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    /// Health probes answered; counts toward confidence alongside requests
    #[serde(default)]
    pub successful_probes: u64,
    /// External quality signal, 0-100
    pub quality_score: f64,
    pub report_count: u32,
    pub verified_owner: bool,
    pub audited_code: bool,
}

impl Default for TrustMetrics {
    fn default() -> Self {
        Self {
            uptime: 100.0,
            avg_response_time_ms: 0.0,
            success_rate: 100.0,
            total_requests: 0,
            total_errors: 0,
            successful_probes: 0,
            quality_score: 50.0,
            report_count: 0,
            verified_owner: false,
            audited_code: false,
        }
    }
}

/// Transport envelope exchanged between peers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub servers: Vec<FederatedServer>,
}

/// Explicitly routed tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub server_id: String,
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Outcome of a forwarded tool call. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCallResult {
    pub fn ok(server_id: impl Into<String>, result: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            server_id: Some(server_id.into()),
            duration_ms: Some(duration_ms),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            server_id: None,
            duration_ms: None,
        }
    }

    pub fn with_server(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    pub success: bool,
    pub server_id: String,
}

/// Filter for `listServers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFilter {
    #[serde(default)]
    pub min_trust: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    /// Every named tool must be present
    #[serde(default)]
    pub has_tools: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Options for catalog search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One ranked hit from the tool catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSearchResult {
    pub server_id: String,
    pub server_name: String,
    pub endpoint: String,
    pub tool: FederatedTool,
    pub trust_score: f64,
    pub relevance: f64,
    pub score: f64,
}

/// Derived network-wide rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub network_id: String,
    pub total_servers: usize,
    pub total_tools: usize,
    pub total_peers: usize,
    pub average_trust: f64,
}

/// Kind of a generic peer control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerMessageType {
    Ping,
    Announce,
    #[serde(other)]
    Other,
}

/// Generic peer control message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMessage {
    #[serde(rename = "type")]
    pub message_type: PeerMessageType,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PeerMessage {
    pub fn ping(sender_id: impl Into<String>) -> Self {
        Self {
            message_type: PeerMessageType::Ping,
            sender_id: sender_id.into(),
            timestamp: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Audit record for one abuse report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbuseReport {
    pub id: String,
    pub server_id: String,
    pub reason: String,
    pub reported_at: DateTime<Utc>,
}

impl AbuseReport {
    pub fn new(server_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: server_id.into(),
            reason: reason.into(),
            reported_at: Utc::now(),
        }
    }
}

/// Body of a `report` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub server_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub reported: bool,
    pub report_count: u32,
    pub trust_score: f64,
}

/// Body of a `verify_owner` call; `proof` format depends on the node's verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOwnerRequest {
    pub server_id: String,
    pub proof: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyOwnerResponse {
    pub verified: bool,
}

/// Audit findings for one server; absent fields stay unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    /// 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audited_code: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    pub trust_score: f64,
    pub metrics: TrustMetrics,
}

/// Tool call that may leave server selection to the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedCallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
}
