use std::sync::Arc;

use super::broadcaster::{Broadcaster, Outbox};
use super::code::CodeGenerator;
use super::engine::RoundEngine;
use super::messages::ServerMessage;
use super::projection::roster;
use super::session::{GameState, Participant, Session};
use super::store::{SessionStore, SharedSession};
use super::{GameSettings, JoinCode};
use crate::error::{GameError, Result};

/// Re-rolls allowed when a generated join code is taken
const MAX_CODE_ATTEMPTS: usize = 32;

const HOST_LEFT_REASON: &str = "Host left the game";

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub username: String,
    pub user_id: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Host connection dropped; the session was torn down
    HostLeft(JoinCode),
    /// A player left before the game started; their record was dropped
    LeftLobby(JoinCode),
    /// A player went offline mid-game; their record stays for reconnects
    PlayerLeft(JoinCode),
}

/// Room creation, joining, chat and disconnects
pub struct LobbyController {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    engine: Arc<RoundEngine>,
    codes: CodeGenerator,
    settings: GameSettings,
}

impl LobbyController {
    pub fn new(
        store: Arc<SessionStore>,
        broadcaster: Arc<Broadcaster>,
        engine: Arc<RoundEngine>,
        settings: GameSettings,
    ) -> Self {
        Self {
            store,
            broadcaster,
            engine,
            codes: CodeGenerator::new(settings.join_code_digits),
            settings,
        }
    }

    /// Creates a lobby with `socket_id` as its host and returns the join code
    pub async fn create_room(&self, socket_id: &str, quiz_id: String, host_id: String) -> Result<JoinCode> {
        if let Some((bound, _)) = self.store.find_by_participant(socket_id).await {
            return Err(GameError::AlreadyInRoom(bound));
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.codes.generate();
            let session = Session::new(code, quiz_id.clone(), host_id.clone(), socket_id.to_string());

            match self.store.create(session).await {
                Ok(handle) => {
                    let mut outbox = Outbox::new();
                    outbox.push(socket_id.to_string(), ServerMessage::RoomCreated { join_code: code });
                    {
                        let session = handle.lock().await;
                        self.broadcaster.room_state(&session, &mut outbox, None);
                    }
                    self.broadcaster.deliver(outbox).await;

                    tracing::info!(join_code = code, quiz_id = %quiz_id, host_id = %host_id, "Room created");
                    return Ok(code);
                }
                Err(GameError::DuplicateCode(code)) => {
                    tracing::debug!(join_code = code, "Join code collision, re-rolling");
                }
                Err(e) => return Err(e),
            }
        }

        Err(GameError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Admits a new player to a lobby, or reattaches a returning player
    /// (same user id, currently offline) to the new connection
    pub async fn join_room(&self, socket_id: &str, code: JoinCode, request: JoinRequest) -> Result<()> {
        if let Some((bound, _)) = self.store.find_by_participant(socket_id).await {
            return Err(GameError::AlreadyInRoom(bound));
        }
        let handle = self.store.get(code).await.ok_or(GameError::RoomNotFound(code))?;

        let mut outbox = Outbox::new();
        {
            let mut session = handle.lock().await;
            if session.closed {
                return Err(GameError::RoomNotFound(code));
            }

            let existing = session
                .players()
                .find(|p| p.user_id == request.user_id)
                .map(|p| (p.socket_id.clone(), p.is_online));

            match existing {
                Some((_, true)) => return Err(GameError::AlreadyInRoom(code)),
                Some((old_socket_id, false)) => {
                    session.rebind(&old_socket_id, socket_id.to_string());
                    self.store.bind_participant(socket_id.to_string(), code).await;
                    tracing::info!(
                        join_code = code,
                        user_id = %request.user_id,
                        socket_id = %socket_id,
                        "Player reconnected"
                    );
                }
                None => {
                    if session.game_state != GameState::Waiting {
                        return Err(GameError::GameAlreadyStarted(code));
                    }
                    if session.player_count() >= self.settings.room_capacity {
                        return Err(GameError::RoomFull(code));
                    }

                    session.participants.push(Participant::player(
                        socket_id.to_string(),
                        request.user_id.clone(),
                        request.username.clone(),
                        request.avatar_url,
                    ));
                    self.store.bind_participant(socket_id.to_string(), code).await;
                    tracing::info!(
                        join_code = code,
                        user_id = %request.user_id,
                        players = session.player_count(),
                        "Player joined"
                    );
                }
            }

            outbox.push(
                socket_id.to_string(),
                ServerMessage::JoinSuccessful {
                    join_code: code,
                    players: roster(&session),
                },
            );
            self.broadcaster.room_state(&session, &mut outbox, Some(socket_id));

            if session.game_state != GameState::Waiting {
                if let Some(participant) = session.participant(socket_id) {
                    let update = self.broadcaster.game_update_for(&session, participant);
                    outbox.push(socket_id.to_string(), update);
                }
            }
        }
        self.broadcaster.deliver(outbox).await;
        Ok(())
    }

    /// Fans a chat line out to everyone online in the room
    pub async fn relay_message(&self, socket_id: &str, code: JoinCode, text: String) -> Result<()> {
        let handle = self.store.get(code).await.ok_or(GameError::RoomNotFound(code))?;

        let mut outbox = Outbox::new();
        {
            let session = handle.lock().await;
            if session.closed {
                return Err(GameError::RoomNotFound(code));
            }
            let from = session
                .participant(socket_id)
                .map(|p| p.display_name.clone())
                .ok_or_else(|| GameError::NotParticipant(socket_id.to_string()))?;

            self.broadcaster
                .to_room(&session, ServerMessage::NewMessage { from, text }, &mut outbox);
        }
        self.broadcaster.deliver(outbox).await;
        Ok(())
    }

    pub async fn handle_disconnect(&self, socket_id: &str) -> Option<DisconnectOutcome> {
        let (code, handle) = self.store.find_by_participant(socket_id).await?;

        let mut outbox = Outbox::new();
        let outcome = {
            let mut session = handle.lock().await;
            if session.closed {
                return None;
            }

            if session.is_host(socket_id) {
                if let Some(host) = session.participant_mut(socket_id) {
                    host.is_online = false;
                }
                self.broadcaster.to_room(
                    &session,
                    ServerMessage::RoomClosed {
                        reason: HOST_LEFT_REASON.to_string(),
                    },
                    &mut outbox,
                );
                self.teardown(code, &handle, &mut session).await;
                tracing::info!(join_code = code, "Host left, room closed");
                DisconnectOutcome::HostLeft(code)
            } else {
                let Some(index) = session.participants.iter().position(|p| p.socket_id == socket_id) else {
                    self.store.unbind_participant(socket_id).await;
                    return None;
                };
                self.store.unbind_participant(socket_id).await;

                if session.game_state == GameState::Waiting {
                    // nothing scored yet, so the seat is freed
                    session.participants.remove(index);
                    tracing::info!(join_code = code, socket_id = %socket_id, "Player left lobby");
                    self.broadcaster.room_state(&session, &mut outbox, None);
                    DisconnectOutcome::LeftLobby(code)
                } else {
                    session.participants[index].is_online = false;
                    tracing::info!(join_code = code, socket_id = %socket_id, "Player went offline");
                    self.engine.settle_if_complete(&handle, &mut session, &mut outbox);
                    self.broadcaster.room_state(&session, &mut outbox, None);
                    DisconnectOutcome::PlayerLeft(code)
                }
            }
        };
        self.broadcaster.deliver(outbox).await;
        Some(outcome)
    }

    async fn teardown(&self, code: JoinCode, handle: &SharedSession, session: &mut Session) {
        session.closed = true;
        session.round_timer = None;
        self.store.remove_if_same(code, handle).await;
    }
}
