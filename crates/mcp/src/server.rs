// MCP server: JSON-RPC 2.0 over line-delimited stdio

use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, Method, ServerCapabilities, ServerInfo, ToolsCapability,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Longest request line accepted before it is rejected as a parse error
const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

pub struct McpServer {
    registry: ToolRegistry,
    server_info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            server_info: ServerInfo {
                name: "toolmesh-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve stdin/stdout until the client closes stdin
    pub async fn start(&self) -> Result<()> {
        tracing::info!("MCP server listening on stdio ({} tools)", self.registry.len());
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one request per line from `reader`, one response per line to `writer`
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        while let Some(line) = lines.next().await {
            let response = match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(&line).await,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!("Dropping request longer than {} bytes", MAX_LINE_LENGTH);
                    Some(JsonRpcResponse::error(
                        serde_json::Value::Null,
                        JsonRpcError::parse_error(),
                    ))
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(response) = response {
                sink.send(serde_json::to_string(&response)?).await?;
            }
        }

        tracing::info!("MCP client disconnected");
        Ok(())
    }

    /// Handle one raw request line; notifications produce no response
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Unparseable request: {}", e);
                return Some(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(_) => return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request())),
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        if request.is_notification() {
            tracing::debug!("Notification: {}", request.method);
            return None;
        }

        let outcome = match Method::parse(&request.method) {
            Some(method) => self.dispatch(method, request.params).await,
            None => Err(JsonRpcError::method_not_found(&request.method)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    async fn dispatch(
        &self,
        method: Method,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        tracing::debug!("Dispatching {}", method.as_str());
        match method {
            Method::Initialize => {
                if let Some(params) = params {
                    if let Ok(init) = serde_json::from_value::<InitializeParams>(params) {
                        tracing::info!(
                            "Client {} {} connected (protocol {})",
                            init.client_info.name,
                            init.client_info.version,
                            init.protocol_version
                        );
                    }
                }
                to_result(&InitializeResult {
                    protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: self.server_info.clone(),
                })
            }
            Method::ListTools => to_result(&ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            Method::CallTool => {
                let params: CallToolParams = params
                    .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
                    .and_then(|p| {
                        serde_json::from_value(p)
                            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
                    })?;

                let tool = self.registry.get(&params.name).ok_or_else(|| {
                    JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name))
                })?;

                tracing::info!("Calling tool {}", params.name);
                let result = tool
                    .execute(params.arguments)
                    .await
                    .map_err(|e| JsonRpcError::invalid_params(format!("{:#}", e)))?;
                to_result(&result)
            }
            Method::Ping => Ok(serde_json::json!({})),
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
