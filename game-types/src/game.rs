use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::{GameSettings, GameType, PlayerId, PlayerType, RoomId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GameStatus {
    Waiting,
    Countdown,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FallingBlock {
    pub id: u32,
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FallingWord {
    pub id: u32,
    pub text: String,
    pub typed: u32, // characters already typed by the locking player
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    pub locked_by: Option<PlayerId>,
}

/// Shared per-game state, one concrete variant per game type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "game_type")]
pub enum GameSpecificState {
    FallingBlocks {
        blocks: Vec<FallingBlock>,
        next_block_id: u32,
        max_errors: u32,
    },
    Blink {
        sequence: String,
        char_time_limit_ms: u64,
        total_chars: u32,
    },
    TypingWalk {
        course: String,
    },
    FallingWords {
        words: Vec<FallingWord>,
        next_word_id: u32,
        next_spawn_ms: u64,
        spawned_count: u32,
        total_words: u32,
    },
    SpeedRace {
        passage: String,
    },
}

/// Per-player slice of the game-specific state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "game_type")]
pub enum PlayerGameData {
    FallingBlocks {
        error_count: u32,
        max_errors: u32,
        next_spawn_ms: u64,
    },
    Blink {
        index: u32,
        shown_at_ms: u64,
        response_time_total_ms: u64,
        streak: u32,
        best_streak: u32,
        first_answer_count: u32,
    },
    TypingWalk {
        steps: u32,
    },
    FallingWords {
        active_word_id: Option<u32>,
        words_cleared: u32,
    },
    SpeedRace {
        position: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub player_type: PlayerType,
    pub display_name: String,
    pub score: i64,
    pub level: u32,
    pub lives: Option<u32>,
    pub keystrokes: u32,
    pub correct_keystrokes: u32,
    pub errors: u32,
    pub wpm: f64,
    pub accuracy: f64,
    pub is_finished: bool,
    pub is_connected: bool,
    /// Elapsed game time at which this player finished, if they did.
    pub finished_at_ms: Option<u64>,
    pub disconnected_at: Option<String>, // ISO 8601 string
    pub game_data: PlayerGameData,
}

/// Authoritative per-room game state. Owned exclusively by the room's
/// session task for the lifetime of the game; clients only ever receive
/// serialized snapshots of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameState {
    pub room_id: RoomId,
    pub game_type: GameType,
    pub status: GameStatus,
    pub started_at: String, // ISO 8601 string
    pub started_at_ms: u64, // unix millis, for current-time computation
    pub elapsed_ms: u64,
    pub settings: GameSettings,
    pub players: HashMap<PlayerId, PlayerState>,
    pub game_specific: GameSpecificState,
}

impl GameState {
    pub fn current_time_ms(&self) -> u64 {
        self.started_at_ms + self.elapsed_ms
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&player_id)
    }

    pub fn connected_players(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.values().filter(|p| p.is_connected)
    }

    /// Whether no connected player is still playing. A seat whose player
    /// walked away never finishes and must not hold the game open; the
    /// all-disconnected case is handled by the session grace window.
    pub fn all_finished(&self) -> bool {
        let mut connected = self.connected_players().peekable();
        connected.peek().is_some() && connected.all(|p| p.is_finished)
    }

    pub fn all_disconnected(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| !p.is_connected)
    }
}
