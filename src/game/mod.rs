use std::time::Duration;

use crate::config::{DEFAULT_END_GRACE_SECS, DEFAULT_JOIN_CODE_DIGITS, DEFAULT_ROOM_CAPACITY};

mod broadcaster;
mod code;
mod engine;
mod lobby;
mod messages;
mod projection;
pub mod scoring;
mod server;
mod session;
mod signaling;
mod store;

pub use broadcaster::{Broadcaster, ConnectionSender, Outbox, RoundTimeout};
pub use code::CodeGenerator;
pub use engine::{AnswerOutcome, RoundEngine};
pub use lobby::{DisconnectOutcome, JoinRequest, LobbyController};
pub use messages::{ClientMessage, GameView, ServerMessage};
pub use projection::{HostView, PlayerQuestion, PlayerView, RosterEntry};
pub use server::{GameServer, ServerStats};
pub use session::{GameState, Participant, Role, Session};
pub use signaling::GameSignalingHandler;
pub use store::{SessionStore, SharedSession};

/// Numeric room code players type in
pub type JoinCode = u32;

/// Server-assigned id of one client connection
pub type SocketId = String;

/// Tunables shared by the lobby and the round engine
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Maximum number of player records per room, host excluded
    pub room_capacity: usize,
    pub join_code_digits: u32,
    /// How long a finished session stays readable
    pub end_grace: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            room_capacity: DEFAULT_ROOM_CAPACITY,
            join_code_digits: DEFAULT_JOIN_CODE_DIGITS,
            end_grace: Duration::from_secs(DEFAULT_END_GRACE_SECS),
        }
    }
}
