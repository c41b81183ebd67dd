use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;

use super::messages::{GameView, ServerMessage};
use super::projection::{render, roster};
use super::session::{GameState, Participant, Role, RoundTimer, Session};
use super::{JoinCode, SocketId};

/// Outbound half of one client connection
pub type ConnectionSender = mpsc::UnboundedSender<ServerMessage>;

/// Sent when a round's time limit elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTimeout {
    pub join_code: JoinCode,
    pub round: u64,
}

/// Messages rendered under a session lock, delivered after it is released
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<(SocketId, ServerMessage)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, socket_id: SocketId, message: ServerMessage) {
        self.messages.push((socket_id, message));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Renders session state for each recipient and owns the round timers
///
/// Timer expiry is reported on the `timeouts` channel and handled by the
/// round engine like any other inbound event.
pub struct Broadcaster {
    connections: RwLock<HashMap<SocketId, ConnectionSender>>,
    timeouts: mpsc::UnboundedSender<RoundTimeout>,
}

impl Broadcaster {
    pub fn new(timeouts: mpsc::UnboundedSender<RoundTimeout>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            timeouts,
        }
    }

    pub async fn register(&self, socket_id: SocketId, sender: ConnectionSender) {
        self.connections.write().await.insert(socket_id, sender);
    }

    pub async fn unregister(&self, socket_id: &str) {
        self.connections.write().await.remove(socket_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn send_to(&self, socket_id: &str, message: ServerMessage) {
        let mut outbox = Outbox::new();
        outbox.push(socket_id.to_string(), message);
        self.deliver(outbox).await;
    }

    pub async fn deliver(&self, outbox: Outbox) {
        if outbox.is_empty() {
            return;
        }
        let connections = self.connections.read().await;
        for (socket_id, message) in outbox.messages {
            match connections.get(&socket_id) {
                Some(sender) => {
                    if sender.send(message).is_err() {
                        tracing::debug!(socket_id = %socket_id, "Connection closed before delivery");
                    }
                }
                None => {
                    tracing::debug!(socket_id = %socket_id, "Dropping message for unknown connection");
                }
            }
        }
    }

    /// Queues a `game-update` for every online participant and arms the
    /// round timer if this round has none yet
    pub fn push(&self, session: &mut Session, outbox: &mut Outbox) {
        self.arm_round_timer(session);

        let (host_view, player_view) = render(session);
        for participant in session.participants.iter().filter(|p| p.is_online) {
            let view = match participant.role {
                Role::Host => GameView::Host(host_view.clone()),
                Role::Player => GameView::Player(player_view.clone().addressed_to(session, participant)),
            };
            outbox.push(participant.socket_id.clone(), ServerMessage::GameUpdate { view });
        }
    }

    /// `game-update` for a single participant, e.g. after a reconnect
    pub fn game_update_for(&self, session: &Session, participant: &Participant) -> ServerMessage {
        let (host_view, player_view) = render(session);
        let view = match participant.role {
            Role::Host => GameView::Host(host_view),
            Role::Player => GameView::Player(player_view.addressed_to(session, participant)),
        };
        ServerMessage::GameUpdate { view }
    }

    /// Queues the roster for everyone online except `except`
    pub fn room_state(&self, session: &Session, outbox: &mut Outbox, except: Option<&str>) {
        let players = roster(session);
        for socket_id in session.online_sockets() {
            if Some(socket_id.as_str()) == except {
                continue;
            }
            outbox.push(
                socket_id.clone(),
                ServerMessage::UpdateRoomState {
                    players: players.clone(),
                },
            );
        }
    }

    /// Queues the same message for everyone online
    pub fn to_room(&self, session: &Session, message: ServerMessage, outbox: &mut Outbox) {
        for socket_id in session.online_sockets() {
            outbox.push(socket_id.clone(), message.clone());
        }
    }

    fn arm_round_timer(&self, session: &mut Session) {
        if session.game_state != GameState::Question {
            return;
        }
        if session.round_timer.as_ref().is_some_and(|t| t.round == session.round) {
            return;
        }
        let Some(question) = session.current_question() else {
            return;
        };

        let limit = question.time_limit();
        let timeout = RoundTimeout {
            join_code: session.join_code,
            round: session.round,
        };
        let timeouts = self.timeouts.clone();
        let handle = tokio::spawn(async move {
            sleep(limit).await;
            tracing::debug!(join_code = timeout.join_code, round = timeout.round, "Round timer fired");
            if timeouts.send(timeout).is_err() {
                tracing::warn!(join_code = timeout.join_code, "Round engine gone, timeout dropped");
            }
        });

        tracing::debug!(
            join_code = session.join_code,
            round = session.round,
            limit_secs = limit.as_secs(),
            "Round timer armed"
        );
        // replacing a stale timer aborts it
        session.round_timer = Some(RoundTimer::new(session.round, handle));
    }
}
