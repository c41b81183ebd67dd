use std::sync::Arc;
use serde::Serialize;
use tokio::sync::mpsc;

use super::broadcaster::{Broadcaster, ConnectionSender};
use super::engine::RoundEngine;
use super::lobby::LobbyController;
use super::messages::ServerMessage;
use super::store::SessionStore;
use super::{GameSettings, SocketId};
use crate::backend::{QuizSource, ResultQueue};

/// Snapshot served by the health endpoint
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ServerStats {
    pub lobby_sessions: usize,
    pub active_sessions: usize,
    pub connections: usize,
}

/// Owns every live game and the connections attached to them
pub struct GameServer {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    engine: Arc<RoundEngine>,
    lobby: LobbyController,
    settings: GameSettings,
}

impl GameServer {
    /// Builds the server and starts round timeout processing, so this must
    /// run inside a tokio runtime
    pub fn new(settings: GameSettings, quizzes: Arc<dyn QuizSource>, results: ResultQueue) -> Arc<Self> {
        let (timeout_sender, timeout_receiver) = mpsc::unbounded_channel();

        let store = Arc::new(SessionStore::new());
        let broadcaster = Arc::new(Broadcaster::new(timeout_sender));
        let engine = Arc::new(RoundEngine::new(
            store.clone(),
            broadcaster.clone(),
            quizzes,
            results,
            settings.clone(),
            timeout_receiver,
        ));
        engine.clone().start_timeout_processing();

        let lobby = LobbyController::new(store.clone(), broadcaster.clone(), engine.clone(), settings.clone());

        tracing::info!(
            room_capacity = settings.room_capacity,
            join_code_digits = settings.join_code_digits,
            "Game server initialized"
        );

        Arc::new(Self {
            store,
            broadcaster,
            engine,
            lobby,
            settings,
        })
    }

    pub fn lobby(&self) -> &LobbyController {
        &self.lobby
    }

    pub fn engine(&self) -> &RoundEngine {
        &self.engine
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Registers a connection's outbound channel and assigns its id
    pub async fn connect(&self, sender: ConnectionSender) -> SocketId {
        let socket_id = new_socket_id();
        self.broadcaster.register(socket_id.clone(), sender).await;
        tracing::debug!(socket_id = %socket_id, "Connection registered");
        socket_id
    }

    pub async fn disconnect(&self, socket_id: &str) {
        if let Some(outcome) = self.lobby.handle_disconnect(socket_id).await {
            tracing::debug!(socket_id = %socket_id, outcome = ?outcome, "Disconnect handled");
        }
        self.broadcaster.unregister(socket_id).await;
    }

    pub async fn send_to(&self, socket_id: &str, message: ServerMessage) {
        self.broadcaster.send_to(socket_id, message).await;
    }

    pub async fn stats(&self) -> ServerStats {
        let (lobby_sessions, active_sessions) = self.store.counts().await;
        ServerStats {
            lobby_sessions,
            active_sessions,
            connections: self.broadcaster.connection_count().await,
        }
    }
}

fn new_socket_id() -> SocketId {
    format!("{:016x}", rand::random::<u64>())
}
