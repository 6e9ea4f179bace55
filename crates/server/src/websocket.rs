use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use toolmesh_core::FederationEvent;

use crate::config::AppState;

/// Messages pushed to event stream clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// A federation event
    Event { event: FederationEvent },
    /// Client subscription confirmation
    Subscribed {
        subscription_id: String,
        server_id: Option<String>,
    },
    /// The client fell behind and missed events; resync via `/api/servers`
    Lagged { skipped: u64 },
    /// Error message
    Error { message: String },
}

/// Subscription requests sent by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum WsRequest {
    /// Stream every event
    SubscribeAll,
    /// Stream only events about one server
    SubscribeServer { server_id: String },
    /// Close the stream
    Unsubscribe,
}

/// WebSocket handler streaming federation events
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn should_forward(filter: Option<&str>, event: &FederationEvent) -> bool {
    filter.map_or(true, |server_id| event.server_id() == server_id)
}

async fn send_json(socket: &mut WebSocket, message: &WsMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to encode websocket message: {}", e);
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.node.subscribe();
    let mut filter: Option<String> = None;

    let confirm = WsMessage::Subscribed {
        subscription_id: uuid::Uuid::new_v4().to_string(),
        server_id: None,
    };
    if !send_json(&mut socket, &confirm).await {
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => {
                let outbound = match received {
                    Ok(event) if should_forward(filter.as_deref(), &event) => WsMessage::Event { event },
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event stream client lagged by {} events", skipped);
                        WsMessage::Lagged { skipped }
                    }
                    Err(RecvError::Closed) => break,
                };
                if !send_json(&mut socket, &outbound).await {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received WS message: {}", text);
                        match serde_json::from_str::<WsRequest>(&text) {
                            Ok(WsRequest::SubscribeAll) => {
                                filter = None;
                            }
                            Ok(WsRequest::SubscribeServer { server_id }) => {
                                tracing::info!("Client subscribed to server {}", server_id);
                                filter = Some(server_id);
                            }
                            Ok(WsRequest::Unsubscribe) => {
                                tracing::info!("Client unsubscribed");
                                break;
                            }
                            Err(e) => {
                                let error = WsMessage::Error { message: format!("Invalid request: {}", e) };
                                if !send_json(&mut socket, &error).await {
                                    break;
                                }
                                continue;
                            }
                        }
                        let confirm = WsMessage::Subscribed {
                            subscription_id: uuid::Uuid::new_v4().to_string(),
                            server_id: filter.clone(),
                        };
                        if !send_json(&mut socket, &confirm).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        let _ = socket.send(Message::Pong(Bytes::new())).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("WebSocket connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!("WebSocket connection terminated");
}
