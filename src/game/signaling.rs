use std::sync::Arc;

use super::broadcaster::ConnectionSender;
use super::lobby::JoinRequest;
use super::messages::{ClientMessage, ServerMessage};
use super::server::GameServer;
use super::SocketId;
use crate::error::Result;

/// Per-connection dispatcher from client frames to game operations
pub struct GameSignalingHandler {
    server: Arc<GameServer>,
    socket_id: SocketId,
}

impl GameSignalingHandler {
    pub async fn new(server: Arc<GameServer>, sender: ConnectionSender) -> Self {
        let socket_id = server.connect(sender).await;
        Self { server, socket_id }
    }

    pub fn socket_id(&self) -> &str {
        &self.socket_id
    }

    /// Applies one client frame. Failures the client should hear about come
    /// back as an `error-message`; the rest are only logged.
    pub async fn handle_message(&self, message: ClientMessage) {
        let kind = message_kind(&message);

        if let Err(e) = self.dispatch(message).await {
            if e.is_reportable() {
                tracing::warn!(socket_id = %self.socket_id, message = kind, error = %e, "Request failed");
                self.server
                    .send_to(&self.socket_id, ServerMessage::error(e.to_string()))
                    .await;
            } else {
                tracing::debug!(socket_id = %self.socket_id, message = kind, error = %e, "Request ignored");
            }
        }
    }

    async fn dispatch(&self, message: ClientMessage) -> Result<()> {
        let socket_id = self.socket_id.as_str();

        match message {
            ClientMessage::CreateRoom { quiz_id, host_id } => {
                self.server.lobby().create_room(socket_id, quiz_id, host_id).await?;
            }
            ClientMessage::JoinRoom {
                join_code,
                username,
                user_id,
                user_profile,
            } => {
                let request = JoinRequest {
                    username,
                    user_id,
                    avatar_url: user_profile,
                };
                self.server.lobby().join_room(socket_id, join_code, request).await?;
            }
            ClientMessage::HostMessage { join_code, text } => {
                self.server.lobby().relay_message(socket_id, join_code, text).await?;
            }
            ClientMessage::StartGame { join_code } => {
                self.server.engine().start_game(socket_id, join_code).await?;
            }
            ClientMessage::SubmitAnswer {
                join_code,
                option_index,
            } => {
                self.server
                    .engine()
                    .submit_answer(socket_id, join_code, option_index)
                    .await?;
            }
            ClientMessage::RequestNextQuestion { join_code } => {
                self.server.engine().next_question(socket_id, join_code).await?;
            }
        }
        Ok(())
    }

    pub async fn cleanup(&self) {
        tracing::debug!(socket_id = %self.socket_id, "Cleaning up connection");
        self.server.disconnect(&self.socket_id).await;
    }
}

fn message_kind(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::CreateRoom { .. } => "create-room",
        ClientMessage::JoinRoom { .. } => "join-room",
        ClientMessage::HostMessage { .. } => "host-message",
        ClientMessage::StartGame { .. } => "start-game",
        ClientMessage::SubmitAnswer { .. } => "submit-answer",
        ClientMessage::RequestNextQuestion { .. } => "request-next-question",
    }
}
