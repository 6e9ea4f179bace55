// Federation tools: browse, search, call and report through a toolmesh node

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{
    json_schema_array, json_schema_number, json_schema_object, json_schema_string, Tool,
    ToolRegistry,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolmesh_core::types::{SearchOptions, ServerFilter};
use toolmesh_sdk::{ToolmeshClient, ToolmeshResult};

/// Register every federation tool against `client`
pub fn register_federation_tools(registry: &mut ToolRegistry, client: ToolmeshClient) {
    registry.register(Arc::new(ListServersTool::new(client.clone())));
    registry.register(Arc::new(SearchToolsTool::new(client.clone())));
    registry.register(Arc::new(CallToolTool::new(client.clone())));
    registry.register(Arc::new(ReportServerTool::new(client.clone())));
    registry.register(Arc::new(StatsTool::new(client)));
}

/// Node failures become tool-level errors the agent can read
fn into_result<T: Serialize>(tool: &str, outcome: ToolmeshResult<T>) -> Result<CallToolResult> {
    match outcome {
        Ok(value) => Ok(CallToolResult::json(&value)?),
        Err(e) => {
            tracing::warn!("{} failed: {}", tool, e);
            Ok(CallToolResult::error(e.to_string()))
        }
    }
}

/// Tool to list known servers
pub struct ListServersTool {
    client: ToolmeshClient,
}

impl ListServersTool {
    pub fn new(client: ToolmeshClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListServersArgs {
    #[serde(default)]
    min_trust: Option<f64>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    has_tools: Vec<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait::async_trait]
impl Tool for ListServersTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "federation_list_servers".to_string(),
            description: "List federated tool servers, highest trust first".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "min_trust": json_schema_number("Only servers with at least this trust score (0-100)"),
                    "category": json_schema_string("Only servers exposing a tool in this category"),
                    "has_tools": json_schema_array(
                        serde_json::json!({"type": "string"}),
                        "Only servers exposing every one of these tools"
                    ),
                    "limit": json_schema_number("Maximum number of servers to return")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ListServersArgs = if arguments.is_null() {
            ListServersArgs::default()
        } else {
            serde_json::from_value(arguments)
                .context("Invalid arguments for federation_list_servers")?
        };

        let filter = ServerFilter {
            min_trust: args.min_trust,
            category: args.category,
            has_tools: args.has_tools,
            limit: args.limit,
        };
        into_result(
            "federation_list_servers",
            self.client.servers().list(&filter).await,
        )
    }
}

/// Tool to search the federated tool catalog
pub struct SearchToolsTool {
    client: ToolmeshClient,
}

impl SearchToolsTool {
    pub fn new(client: ToolmeshClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchToolsArgs {
    query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait::async_trait]
impl Tool for SearchToolsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "federation_search_tools".to_string(),
            description: "Search tools across the federation, ranked by relevance and trust"
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "query": json_schema_string("Words to match against tool names and descriptions"),
                    "category": json_schema_string("Only tools in this category"),
                    "limit": json_schema_number("Maximum number of results (default: 20)")
                }),
                vec!["query"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: SearchToolsArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for federation_search_tools")?;

        let options = SearchOptions {
            category: args.category,
            limit: args.limit,
        };
        into_result(
            "federation_search_tools",
            self.client.tools().search(&args.query, &options).await,
        )
    }
}

/// Tool to invoke a tool on a federated server
pub struct CallToolTool {
    client: ToolmeshClient,
}

impl CallToolTool {
    pub fn new(client: ToolmeshClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolArgs {
    tool: String,
    #[serde(default)]
    server_id: Option<String>,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[async_trait::async_trait]
impl Tool for CallToolTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "federation_call_tool".to_string(),
            description: "Call a tool on a federated server. Without server_id the most trusted provider is chosen"
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "tool": json_schema_string("Name of the tool to call"),
                    "server_id": json_schema_string("Server to call; omit to auto-select"),
                    "arguments": {
                        "type": "object",
                        "description": "Arguments passed through to the tool"
                    }
                }),
                vec!["tool"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: CallToolArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for federation_call_tool")?;
        let params = if args.arguments.is_null() {
            serde_json::json!({})
        } else {
            args.arguments
        };

        let tools = self.client.tools();
        let outcome = match &args.server_id {
            Some(server_id) => tools.call(server_id, &args.tool, params).await,
            None => tools.call_auto(&args.tool, params).await,
        };

        let failed = outcome.as_ref().is_ok_and(|call| !call.success);
        let mut result = into_result("federation_call_tool", outcome)?;
        if failed {
            result.is_error = Some(true);
        }
        Ok(result)
    }
}

/// Tool to file an abuse report against a server
pub struct ReportServerTool {
    client: ToolmeshClient,
}

impl ReportServerTool {
    pub fn new(client: ToolmeshClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ReportServerArgs {
    server_id: String,
    reason: String,
}

#[async_trait::async_trait]
impl Tool for ReportServerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "federation_report_server".to_string(),
            description: "Report a federated server for abuse; lowers its trust score".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "server_id": json_schema_string("Server to report"),
                    "reason": json_schema_string("What the server did wrong")
                }),
                vec!["server_id", "reason"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ReportServerArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for federation_report_server")?;
        into_result(
            "federation_report_server",
            self.client
                .servers()
                .report(&args.server_id, &args.reason)
                .await,
        )
    }
}

/// Tool to summarize the network
pub struct StatsTool {
    client: ToolmeshClient,
}

impl StatsTool {
    pub fn new(client: ToolmeshClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Tool for StatsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "federation_stats".to_string(),
            description: "Network-wide server, tool and trust totals".to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<CallToolResult> {
        into_result("federation_stats", self.client.network().stats().await)
    }
}
