//! WebSocket handler for real-time updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use shadowlink_core::DiscoveredResource;
use shadowlink_discovery::DiscoveryEvent;
use shadowlink_proxy::ResourceDescriptor;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::{AppState, ProxyEvent};

/// WebSocket message types
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    #[serde(rename = "scan_started")]
    ScanStarted,
    #[serde(rename = "resource_discovered")]
    ResourceDiscovered(DiscoveredResource),
    #[serde(rename = "scan_completed")]
    ScanCompleted { found: usize },
    #[serde(rename = "shadow_published")]
    ShadowPublished(ResourceDescriptor),
    #[serde(rename = "pong")]
    Pong,
}

impl From<ProxyEvent> for WsMessage {
    fn from(event: ProxyEvent) -> Self {
        match event {
            ProxyEvent::Discovery(DiscoveryEvent::ScanStarted) => WsMessage::ScanStarted,
            ProxyEvent::Discovery(DiscoveryEvent::ResourceDiscovered(resource)) => {
                WsMessage::ResourceDiscovered(resource)
            }
            ProxyEvent::Discovery(DiscoveryEvent::ScanCompleted { found }) => WsMessage::ScanCompleted { found },
            ProxyEvent::ShadowPublished(descriptor) => WsMessage::ShadowPublished(descriptor),
        }
    }
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();

    info!("WebSocket client connected");

    // Send current shadows on connect
    for descriptor in state.resources().await {
        let msg = WsMessage::ShadowPublished(descriptor);
        if let Ok(json) = serde_json::to_string(&msg) {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }

    // Forward proxy events and answer the client
    loop {
        tokio::select! {
            // Discovery and shadow events
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&WsMessage::from(event)) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // a slow client only misses events
                        debug!(skipped = n, "Event channel lagged");
                    }
                    Err(e) => {
                        debug!(error = %e, "Event channel error");
                        break;
                    }
                }
            }

            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Application-level keepalive
                        if text.as_str() == "ping" {
                            if let Ok(pong) = serde_json::to_string(&WsMessage::Pong) {
                                if sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shape() {
        let json = serde_json::to_value(WsMessage::from(ProxyEvent::Discovery(
            DiscoveryEvent::ScanCompleted { found: 3 },
        )))
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "scan_completed", "data": { "found": 3 } }));

        let json = serde_json::to_value(WsMessage::Pong).unwrap();
        assert_eq!(json["type"], "pong");
    }

    #[test]
    fn test_shadow_message() {
        let descriptor = ResourceDescriptor {
            href: "/d2dserverlist".into(),
            rt: vec!["oic.r.d2dserverlist".into()],
            interfaces: vec!["oic.if.baseline".into(), "oic.if.rw".into()],
            default_interface: "oic.if.rw".into(),
        };
        let json = serde_json::to_value(WsMessage::from(ProxyEvent::ShadowPublished(descriptor))).unwrap();
        assert_eq!(json["type"], "shadow_published");
        assert_eq!(json["data"]["href"], "/d2dserverlist");
    }
}
