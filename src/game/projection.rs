//! Role-specific renderings of a session
//!
//! The host and player views are separate types over the same `Session`.
//! `PlayerQuestion` carries option text only, so no code path can hand a
//! player the per-option correctness flags. During `results` the player
//! view gains the correct option's index and nothing more.

use serde::Serialize;

use super::session::{GameState, Participant, Role, Session};
use super::{JoinCode, SocketId};
use crate::backend::{Question, Standing};

/// One line of the room roster
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub socket_id: SocketId,
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_online: bool,
    pub score: u32,
    pub answered: bool,
}

impl From<&Participant> for RosterEntry {
    fn from(p: &Participant) -> Self {
        Self {
            socket_id: p.socket_id.clone(),
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            avatar_url: p.avatar_url.clone(),
            role: p.role,
            is_online: p.is_online,
            score: p.score,
            answered: p.answered,
        }
    }
}

pub fn roster(session: &Session) -> Vec<RosterEntry> {
    session.participants.iter().map(RosterEntry::from).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct HostOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostQuestion {
    pub text: String,
    pub image_url: Option<String>,
    pub points: u32,
    pub time_limit_secs: u64,
    pub options: Vec<HostOption>,
    pub correct_index: Option<usize>,
}

impl From<&Question> for HostQuestion {
    fn from(q: &Question) -> Self {
        Self {
            text: q.text.clone(),
            image_url: q.image_url.clone(),
            points: q.points,
            time_limit_secs: q.time_limit_secs,
            options: q
                .options
                .iter()
                .map(|o| HostOption {
                    text: o.text.clone(),
                    is_correct: o.is_correct,
                })
                .collect(),
            correct_index: q.correct_index(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerQuestion {
    pub text: String,
    pub image_url: Option<String>,
    pub points: u32,
    pub time_limit_secs: u64,
    pub options: Vec<String>,
}

impl From<&Question> for PlayerQuestion {
    fn from(q: &Question) -> Self {
        Self {
            text: q.text.clone(),
            image_url: q.image_url.clone(),
            points: q.points,
            time_limit_secs: q.time_limit_secs,
            options: q.options.iter().map(|o| o.text.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HostView {
    pub join_code: JoinCode,
    pub state: GameState,
    pub question_index: usize,
    pub question_count: usize,
    pub question: Option<HostQuestion>,
    /// Option index -> how many players picked it, for the current round
    pub answer_counts: Vec<usize>,
    pub answered_count: usize,
    pub players: Vec<RosterEntry>,
    pub standings: Option<Vec<Standing>>,
    pub your_socket_id: SocketId,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub join_code: JoinCode,
    pub state: GameState,
    pub question_index: usize,
    pub question_count: usize,
    pub question: Option<PlayerQuestion>,
    /// Present only while showing results
    pub correct_index: Option<usize>,
    pub answered_count: usize,
    pub players: Vec<RosterEntry>,
    pub standings: Option<Vec<Standing>>,
    pub your_socket_id: SocketId,
    pub your_answer: Option<usize>,
    pub your_score: u32,
}

impl PlayerView {
    /// Fills in the fields that differ per recipient
    pub fn addressed_to(mut self, session: &Session, participant: &Participant) -> Self {
        self.your_socket_id = participant.socket_id.clone();
        self.your_answer = session.answers.get(&participant.socket_id).copied();
        self.your_score = participant.score;
        self
    }
}

fn shown_question(session: &Session) -> Option<&Question> {
    match session.game_state {
        GameState::Question | GameState::Results => session.current_question(),
        GameState::Waiting | GameState::End => None,
    }
}

fn final_standings(session: &Session) -> Option<Vec<Standing>> {
    (session.game_state == GameState::End).then(|| session.standings())
}

pub fn render_host(session: &Session) -> HostView {
    let question = shown_question(session);
    let mut answer_counts = vec![0; question.map_or(0, |q| q.options.len())];
    for choice in session.answers.values() {
        if let Some(count) = answer_counts.get_mut(*choice) {
            *count += 1;
        }
    }

    HostView {
        join_code: session.join_code,
        state: session.game_state,
        question_index: session.current_question_index,
        question_count: session.questions.len(),
        question: question.map(HostQuestion::from),
        answer_counts,
        answered_count: session.answered_count(),
        players: roster(session),
        standings: final_standings(session),
        your_socket_id: session.host_socket_id.clone(),
    }
}

/// Player view shared by every player; see [`PlayerView::addressed_to`]
pub fn render_player(session: &Session) -> PlayerView {
    let question = shown_question(session);
    let correct_index = match session.game_state {
        GameState::Results => question.and_then(Question::correct_index),
        _ => None,
    };

    PlayerView {
        join_code: session.join_code,
        state: session.game_state,
        question_index: session.current_question_index,
        question_count: session.questions.len(),
        question: question.map(PlayerQuestion::from),
        correct_index,
        answered_count: session.answered_count(),
        players: roster(session),
        standings: final_standings(session),
        your_socket_id: SocketId::new(),
        your_answer: None,
        your_score: 0,
    }
}

pub fn render(session: &Session) -> (HostView, PlayerView) {
    (render_host(session), render_player(session))
}
