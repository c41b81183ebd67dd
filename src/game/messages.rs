use serde::{Deserialize, Serialize};

use super::projection::{HostView, PlayerView, RosterEntry};
use super::JoinCode;

/// Frames sent by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom {
        quiz_id: String,
        host_id: String,
    },

    JoinRoom {
        join_code: JoinCode,
        username: String,
        user_id: String,
        /// Avatar URL
        #[serde(default)]
        user_profile: Option<String>,
    },

    HostMessage {
        join_code: JoinCode,
        text: String,
    },

    StartGame {
        join_code: JoinCode,
    },

    SubmitAnswer {
        join_code: JoinCode,
        option_index: usize,
    },

    RequestNextQuestion {
        join_code: JoinCode,
    },
}

/// Frames sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomCreated {
        join_code: JoinCode,
    },

    JoinSuccessful {
        join_code: JoinCode,
        players: Vec<RosterEntry>,
    },

    UpdateRoomState {
        players: Vec<RosterEntry>,
    },

    NewMessage {
        from: String,
        text: String,
    },

    GameUpdate {
        view: GameView,
    },

    ErrorMessage {
        text: String,
    },

    RoomClosed {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum GameView {
    Host(HostView),
    Player(PlayerView),
}

impl ServerMessage {
    pub fn error(text: impl Into<String>) -> Self {
        ServerMessage::ErrorMessage { text: text.into() }
    }
}
