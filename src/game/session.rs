use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::{JoinCode, SocketId};
use crate::backend::{Question, Standing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Waiting,
    Question,
    Results,
    End,
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GameState::Waiting => "waiting",
            GameState::Question => "question",
            GameState::Results => "results",
            GameState::End => "end",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub socket_id: SocketId,
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_online: bool,
    pub score: u32,
    pub answered: bool,
}

impl Participant {
    pub fn player(
        socket_id: SocketId,
        user_id: String,
        display_name: String,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            socket_id,
            user_id,
            display_name,
            avatar_url,
            role: Role::Player,
            is_online: true,
            score: 0,
            answered: false,
        }
    }

    pub fn is_player(&self) -> bool {
        self.role == Role::Player
    }
}

/// Pending round timeout. Dropping it aborts the sleeping task.
#[derive(Debug)]
pub struct RoundTimer {
    pub round: u64,
    handle: JoinHandle<()>,
}

impl RoundTimer {
    pub fn new(round: u64, handle: JoinHandle<()>) -> Self {
        Self { round, handle }
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One live or pending game
#[derive(Debug)]
pub struct Session {
    pub join_code: JoinCode,
    pub quiz_id: String,
    pub host_id: String,
    pub host_socket_id: SocketId,
    /// Join order
    pub participants: Vec<Participant>,
    /// Snapshot taken at game start
    pub questions: Vec<Question>,
    pub current_question_index: usize,
    /// socket id -> chosen option, for the current round only
    pub answers: HashMap<SocketId, usize>,
    pub game_state: GameState,
    /// Sequence number of the current round, bumped every time one begins
    pub round: u64,
    pub round_timer: Option<RoundTimer>,
    /// Set once the session has been torn down; late callers treat it as gone
    pub closed: bool,
    pub results_recorded: bool,
}

impl Session {
    pub fn new(join_code: JoinCode, quiz_id: String, host_id: String, host_socket_id: SocketId) -> Self {
        let host = Participant {
            socket_id: host_socket_id.clone(),
            user_id: host_id.clone(),
            display_name: "Host".to_string(),
            avatar_url: None,
            role: Role::Host,
            is_online: true,
            score: 0,
            answered: false,
        };

        Self {
            join_code,
            quiz_id,
            host_id,
            host_socket_id,
            participants: vec![host],
            questions: Vec::new(),
            current_question_index: 0,
            answers: HashMap::new(),
            game_state: GameState::Waiting,
            round: 0,
            round_timer: None,
            closed: false,
            results_recorded: false,
        }
    }

    pub fn participant(&self, socket_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.socket_id == socket_id)
    }

    pub fn participant_mut(&mut self, socket_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.socket_id == socket_id)
    }

    pub fn is_host(&self, socket_id: &str) -> bool {
        self.host_socket_id == socket_id
    }

    pub fn players(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_player())
    }

    pub fn player_count(&self) -> usize {
        self.players().count()
    }

    pub fn online_sockets(&self) -> impl Iterator<Item = &SocketId> {
        self.participants
            .iter()
            .filter(|p| p.is_online)
            .map(|p| &p.socket_id)
    }

    /// True when at least one player is online and every online player has
    /// answered. An empty room waits for the timer instead.
    pub fn all_online_players_answered(&self) -> bool {
        let mut online = self.players().filter(|p| p.is_online).peekable();
        online.peek().is_some() && online.all(|p| p.answered)
    }

    pub fn answered_count(&self) -> usize {
        self.players().filter(|p| p.answered).count()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.questions.len()
    }

    /// Moves a player's identity onto a new connection, carrying any answer
    /// recorded under the old id.
    pub fn rebind(&mut self, old_socket_id: &str, new_socket_id: SocketId) -> bool {
        let Some(participant) = self.participant_mut(old_socket_id) else {
            return false;
        };
        participant.socket_id = new_socket_id.clone();
        participant.is_online = true;

        if let Some(choice) = self.answers.remove(old_socket_id) {
            self.answers.insert(new_socket_id, choice);
        }
        true
    }

    /// Players ordered by score, equal scores sharing a rank and keeping
    /// join order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut players: Vec<&Participant> = self.players().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));

        let mut standings = Vec::with_capacity(players.len());
        let mut rank = 0;
        let mut last_score = None;
        for player in players {
            if last_score != Some(player.score) {
                rank += 1;
                last_score = Some(player.score);
            }
            standings.push(Standing {
                user_id: player.user_id.clone(),
                display_name: player.display_name.clone(),
                score: player.score,
                rank,
            });
        }
        standings
    }
}
