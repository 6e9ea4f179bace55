use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toolmesh_core::types::{FederatedTool, ServerCapabilities, ServerMetadata};
use toolmesh_core::{
    Ed25519OwnershipVerifier, FederationConfig, FederationNode, MemoryServerStore, NodeIdentity,
    RedbServerStore, ServerStore,
};
use toolmesh_sdk::{HttpPeerTransport, PeerConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub federation: FederationConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// How this node describes itself to the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Stable node id; generated once and kept in the data directory when unset
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_node_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Publicly reachable base URL; defaults to the bind address
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default)]
    pub tools: Vec<FederatedTool>,

    #[serde(default)]
    pub capabilities: ServerCapabilities,

    #[serde(default)]
    pub metadata: ServerMetadata,
}

fn default_node_name() -> String {
    "toolmesh-node".to_string()
}

fn default_owner() -> String {
    "anonymous".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_node_name(),
            description: String::new(),
            endpoint: None,
            owner: default_owner(),
            tools: Vec::new(),
            capabilities: ServerCapabilities::default(),
            metadata: ServerMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Keep the federation view in memory only
    #[serde(default)]
    pub in_memory: bool,
}

fn default_index_file() -> String {
    "federation.redb".to_string()
}

const NODE_ID_FILE: &str = "node-id";

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_file: default_index_file(),
            in_memory: false,
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path, data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Self::default()
        };

        config.data_dir = data_dir;
        config.federation = config.federation.sanitized();

        Ok(config)
    }

    /// Get the redb index path
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.index_file)
    }

    /// Configured node id, or the one persisted in the data directory
    pub fn node_id(&self) -> Result<String> {
        if let Some(id) = &self.node.id {
            return Ok(id.clone());
        }

        let path = self.data_dir.join(NODE_ID_FILE);
        if path.exists() {
            let id = std::fs::read_to_string(&path).context("Failed to read node id")?;
            return Ok(id.trim().to_string());
        }

        let id = uuid::Uuid::new_v4().to_string();
        std::fs::write(&path, &id).context("Failed to persist node id")?;
        tracing::info!("Generated node id {}", id);
        Ok(id)
    }

    pub fn identity(&self, bind_addr: &str) -> Result<NodeIdentity> {
        let node = &self.node;
        Ok(NodeIdentity {
            id: self.node_id()?,
            name: node.name.clone(),
            description: node.description.clone(),
            endpoint: node
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("http://{}", bind_addr)),
            owner: node.owner.clone(),
            tools: node.tools.clone(),
            capabilities: node.capabilities.clone(),
            metadata: node.metadata.clone(),
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<FederationNode>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: &ServerConfig, bind_addr: &str) -> Result<Self> {
        let identity = config.identity(bind_addr)?;

        let store: Arc<dyn ServerStore> = if config.storage.in_memory {
            Arc::new(MemoryServerStore::new())
        } else {
            Arc::new(
                RedbServerStore::new(config.index_path())
                    .context("Failed to create server store")?,
            )
        };

        let transport = Arc::new(
            HttpPeerTransport::new(PeerConfig::from_federation(
                identity.id.clone(),
                &config.federation,
            ))
                .context("Failed to create peer transport")?,
        );

        let node = FederationNode::new(
            config.federation.clone(),
            identity,
            store,
            transport,
            Arc::new(Ed25519OwnershipVerifier),
        );

        Ok(Self::with_node(Arc::new(node)))
    }

    pub fn with_node(node: Arc<FederationNode>) -> Self {
        Self {
            node,
            started_at: chrono::Utc::now(),
        }
    }
}
