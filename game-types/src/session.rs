use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{GameType, PlayerId, PlayerType, RoomId, ScoreMetrics};

pub type SessionId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSessionPlayer {
    pub player_id: PlayerId,
    pub player_type: PlayerType,
    pub display_name: String,
    pub score: i64,
    /// Dense rank 1..N, unique, no gaps.
    pub rank: u32,
    pub metrics: ScoreMetrics,
    pub completed_at: Option<String>,    // ISO 8601 string
    pub disconnected_at: Option<String>, // ISO 8601 string
}

/// Aggregate data about the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionData {
    pub seed: u64,
    pub duration_ms: u64,
    pub average_wpm: f64,
    pub total_keystrokes: u64,
}

/// Immutable record of one completed playthrough. Written exactly once
/// when a room's game terminates, never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSession {
    pub id: SessionId,
    pub room_id: RoomId,
    pub game_type: GameType,
    pub players: Vec<GameSessionPlayer>,
    /// Player at rank 1, absent when the top score is tied.
    pub winner: Option<PlayerId>,
    pub data: SessionData,
    pub started_at: String, // ISO 8601 string
    pub ended_at: String,   // ISO 8601 string
}
