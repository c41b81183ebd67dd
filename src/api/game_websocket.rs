use std::sync::Arc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::game::{ClientMessage, GameServer, GameSignalingHandler, ServerMessage};

pub async fn handle_game_websocket(websocket: WebSocket, server: Arc<GameServer>) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let signaling_handler = GameSignalingHandler::new(server, tx).await;
    let socket_id = signaling_handler.socket_id().to_string();
    tracing::info!(socket_id = %socket_id, "Game WebSocket connection established");

    // Serializes outbound frames onto the socket
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize server message");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::text(text)).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                handle_websocket_message(&signaling_handler, message).await;
            }
            Err(e) => {
                tracing::warn!(socket_id = %socket_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    signaling_handler.cleanup().await;
    sender_task.abort();
    tracing::info!(socket_id = %socket_id, "Game WebSocket connection closed");
}

async fn handle_websocket_message(signaling_handler: &GameSignalingHandler, message: Message) {
    let Ok(text) = message.to_str() else {
        return;
    };
    tracing::debug!(socket_id = %signaling_handler.socket_id(), "Received game message: {}", text);

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => signaling_handler.handle_message(client_message).await,
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse game message"
            );
        }
    }
}
