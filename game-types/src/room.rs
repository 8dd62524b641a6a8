use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{PlayerId, PlayerType};

pub type RoomId = Uuid;

pub const MIN_ROOM_PLAYERS: u8 = 1;
pub const MAX_ROOM_PLAYERS: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum GameType {
    FallingBlocks,
    Blink,
    TypingWalk,
    FallingWords,
    SpeedRace,
}

impl GameType {
    pub const ALL: [GameType; 5] = [
        GameType::FallingBlocks,
        GameType::Blink,
        GameType::TypingWalk,
        GameType::FallingWords,
        GameType::SpeedRace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::FallingBlocks => "falling-blocks",
            GameType::Blink => "blink",
            GameType::TypingWalk => "typing-walk",
            GameType::FallingWords => "falling-words",
            GameType::SpeedRace => "speed-race",
        }
    }

    pub fn from_str(s: &str) -> Option<GameType> {
        match s {
            "falling-blocks" => Some(GameType::FallingBlocks),
            "blink" => Some(GameType::Blink),
            "typing-walk" => Some(GameType::TypingWalk),
            "falling-words" => Some(GameType::FallingWords),
            "speed-race" => Some(GameType::SpeedRace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RoomStatus {
    Waiting,
    Countdown,
    Playing,
    Finished,
}

/// Per-room game settings. The seed is generated once at room creation and
/// shared by every player so that content generation is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSettings {
    pub lesson_id: Option<String>,
    pub difficulty: u8,
    pub time_limit_ms: u64,
    pub seed: u64,
}

impl GameSettings {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            lesson_id: None,
            difficulty: 1,
            time_limit_ms: 120_000,
            seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerInRoom {
    pub player_id: PlayerId,
    pub player_type: PlayerType,
    pub display_name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub joined_at: String, // ISO 8601 string
    pub is_connected: bool,
}

/// Lobby-level room snapshot. Members are kept in join order; the first
/// remaining connected member becomes host when the host leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Room {
    pub id: RoomId,
    pub game_type: GameType,
    pub name: String,
    pub has_password: bool,
    pub max_players: u8,
    pub players: Vec<PlayerInRoom>,
    pub status: RoomStatus,
    pub settings: GameSettings,
    pub created_at: String, // ISO 8601 string
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

impl Room {
    pub fn host(&self) -> Option<&PlayerInRoom> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&PlayerInRoom> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }
}

/// Compact listing entry for the lobby room browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomInfo {
    pub id: RoomId,
    pub game_type: GameType,
    pub name: String,
    pub has_password: bool,
    pub player_count: u8,
    pub max_players: u8,
    pub status: RoomStatus,
}

impl From<&Room> for RoomInfo {
    fn from(room: &Room) -> Self {
        RoomInfo {
            id: room.id,
            game_type: room.game_type,
            name: room.name.clone(),
            has_password: room.has_password,
            player_count: room.players.len() as u8,
            max_players: room.max_players,
            status: room.status,
        }
    }
}
