use thiserror::Error;

use crate::game::JoinCode;

/// Error vocabulary of the live game service
#[derive(Debug, Error)]
pub enum GameError {
    /// Lookup errors, reported to the requesting connection only
    #[error("Room {0} not found")]
    RoomNotFound(JoinCode),

    #[error("Quiz {0} not found")]
    QuizNotFound(String),

    #[error("Quiz {0} has no questions")]
    EmptyQuiz(String),

    /// Capacity errors
    #[error("Room {0} is full")]
    RoomFull(JoinCode),

    /// State machine errors
    #[error("Game in room {0} has already started")]
    GameAlreadyStarted(JoinCode),

    #[error("Action not allowed while game is {0}")]
    InvalidState(String),

    #[error("Option {0} does not exist")]
    InvalidOption(usize),

    #[error("Already joined room {0}")]
    AlreadyInRoom(JoinCode),

    #[error("Connection {0} is not the host of this room")]
    NotHost(String),

    #[error("Connection {0} is not part of this room")]
    NotParticipant(String),

    /// Store errors
    #[error("Join code {0} is already in use")]
    DuplicateCode(JoinCode),

    #[error("No free join code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// Collaborator errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using GameError
pub type Result<T> = std::result::Result<T, GameError>;

impl GameError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        GameError::Internal(msg.into())
    }

    /// Whether the requester should be told about this error.
    ///
    /// State-machine violations are dropped silently; everything else
    /// becomes an `error-message` frame for the sender only.
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            GameError::InvalidState(_)
                | GameError::InvalidOption(_)
                | GameError::NotHost(_)
                | GameError::NotParticipant(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GameError::RoomNotFound(123456);
        assert_eq!(err.to_string(), "Room 123456 not found");

        let err = GameError::RoomFull(654321);
        assert_eq!(err.to_string(), "Room 654321 is full");
    }

    #[test]
    fn test_error_helpers() {
        let err = GameError::internal("Something went wrong");
        assert!(matches!(err, GameError::Internal(_)));
    }

    #[test]
    fn test_invalid_state_is_silent() {
        assert!(!GameError::InvalidState("waiting".to_string()).is_reportable());
        assert!(!GameError::NotHost("abc".to_string()).is_reportable());
        assert!(GameError::RoomNotFound(1).is_reportable());
        assert!(GameError::QuizNotFound("q1".to_string()).is_reportable());
    }
}
