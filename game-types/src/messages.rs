use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    GameSession, GameState, GameType, PlayerId, PlayerIdentity, PlayerInRoom, PlayerState, Room,
    RoomId, RoomInfo,
};

/// Requested settings on room creation; the server fills in the seed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GameSettingsRequest {
    pub lesson_id: Option<String>,
    pub difficulty: Option<u8>,
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    /// Resolves a stable identity for this connection.
    Identify {
        user_id: Option<Uuid>,
        device_id: String,
        display_name: String,
    },
    CreateRoom {
        game_type: GameType,
        name: String,
        password: Option<String>,
        max_players: u8,
        settings: Option<GameSettingsRequest>,
    },
    JoinRoom {
        room_id: RoomId,
        password: Option<String>,
    },
    LeaveRoom,
    SetReady {
        is_ready: bool,
    },
    StartGame,
    KickPlayer {
        player_id: PlayerId,
    },
    QueueForMatch {
        game_type: GameType,
        skill_tier: u8,
    },
    CancelMatch,
    GameInput {
        key: char,
    },
    GameReady,
    ChatSend {
        message: String,
    },
    SpectateRoom {
        room_id: RoomId,
    },
    StopSpectating,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    Identified {
        identity: PlayerIdentity,
    },
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        room_id: RoomId,
    },
    PlayerJoined {
        room_id: RoomId,
        player: PlayerInRoom,
    },
    PlayerLeft {
        room_id: RoomId,
        player_id: PlayerId,
    },
    PlayerReady {
        room_id: RoomId,
        player_id: PlayerId,
        is_ready: bool,
    },
    PlayerKicked {
        room_id: RoomId,
        player_id: PlayerId,
    },
    /// Auto-rejoin notification for a reconnecting client that still has a
    /// live room membership.
    RoomRejoined {
        room_id: RoomId,
        room: Room,
        game: Option<GameState>,
    },
    MatchFound {
        room_id: RoomId,
        room: Room,
    },
    MatchTimeout,
    GameCountdown {
        seconds: u32,
    },
    GameStarted {
        state: GameState,
    },
    GameStateUpdate {
        state: GameState,
    },
    GamePlayerUpdate {
        room_id: RoomId,
        player: PlayerState,
    },
    GameEnded {
        session: GameSession,
    },
    GameInputRejected {
        reason: String,
    },
    GameError {
        message: String,
    },
    ChatMessage {
        player_id: PlayerId,
        display_name: String,
        message: String,
        timestamp: String, // ISO 8601 string
    },
    ChatError {
        message: String,
    },
    SpectatorJoined {
        room_id: RoomId,
    },
    SpectatorCount {
        room_id: RoomId,
        count: u32,
    },
    LobbyPlayers {
        players: Vec<PlayerIdentity>,
    },
    LobbyRooms {
        rooms: Vec<RoomInfo>,
    },
    PlayerConnected {
        player_id: PlayerId,
    },
    PlayerDisconnected {
        player_id: PlayerId,
    },
    Error {
        message: String,
    },
}
