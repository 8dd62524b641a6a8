use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Error taxonomy for room, matchmaking and game-input actions. The
/// `Display` strings double as the human-readable reason sent to clients
/// alongside every rejected action.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RoomError {
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },
    #[error("room not found")]
    RoomNotFound,
    #[error("room is full")]
    RoomFull,
    #[error("incorrect password")]
    InvalidPassword,
    #[error("game already in progress")]
    AlreadyPlaying,
    #[error("only the host can do that")]
    NotHost,
    #[error("not all players ready")]
    NotReady,
    #[error("player is not in this room")]
    PlayerNotInRoom,
    #[error("input rejected: {reason}")]
    InputRejected { reason: String },
    #[error("matchmaking timed out")]
    MatchmakingTimeout,
    #[error("failed to persist: {reason}")]
    PersistenceFailure { reason: String },
}

impl RoomError {
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        RoomError::InvalidParameters {
            reason: reason.into(),
        }
    }

    pub fn input_rejected(reason: impl Into<String>) -> Self {
        RoomError::InputRejected {
            reason: reason.into(),
        }
    }
}
