use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use game_core::room::{LeaveOutcome, LobbyRoom};
use game_types::{
    GameSettings, GameType, PlayerId, PlayerIdentity, Room, RoomError, RoomId, RoomInfo,
    RoomStatus,
};

/// Authoritative set of live rooms. Every lobby mutation goes through
/// here; callers get back the updated snapshot to broadcast.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, LobbyRoom>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_room(
        &self,
        game_type: GameType,
        name: &str,
        password: Option<String>,
        max_players: u8,
        settings: GameSettings,
        host: &PlayerIdentity,
    ) -> Result<Room, RoomError> {
        let lobby_room = LobbyRoom::create(
            game_type,
            name,
            password,
            max_players,
            settings,
            host,
            Utc::now(),
        )?;
        let snapshot = lobby_room.snapshot();

        let mut rooms = self.rooms.write().await;
        rooms.insert(lobby_room.id(), lobby_room);
        Ok(snapshot)
    }

    pub async fn join_room(
        &self,
        room_id: RoomId,
        identity: &PlayerIdentity,
        password: Option<&str>,
    ) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.join(identity, password, Utc::now())?;
        Ok(room.snapshot())
    }

    /// Removes the player; when the room empties it is deleted and the
    /// outcome's `now_empty` flag tells the caller to announce that.
    pub async fn leave_room(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<(LeaveOutcome, Option<Room>), RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        let outcome = room.leave(player_id);
        if outcome.now_empty {
            rooms.remove(&room_id);
            Ok((outcome, None))
        } else {
            Ok((outcome, Some(room.snapshot())))
        }
    }

    pub async fn set_ready(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        is_ready: bool,
    ) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.set_ready(player_id, is_ready)?;
        Ok(room.snapshot())
    }

    pub async fn kick(
        &self,
        room_id: RoomId,
        by: PlayerId,
        target: PlayerId,
    ) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.kick(by, target)?;
        Ok(room.snapshot())
    }

    /// Validates the host's start request and moves the room into its
    /// countdown in one registry lock.
    pub async fn start_countdown(
        &self,
        room_id: RoomId,
        by: PlayerId,
    ) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.check_start(by)?;
        room.begin_countdown();
        Ok(room.snapshot())
    }

    pub async fn begin_playing(&self, room_id: RoomId) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.begin_playing(Utc::now());
        Ok(room.snapshot())
    }

    pub async fn finish_room(&self, room_id: RoomId) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.finish(Utc::now());
        Ok(room.snapshot())
    }

    pub async fn set_connected(&self, room_id: RoomId, player_id: PlayerId, connected: bool) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&room_id) {
            room.set_connected(player_id, connected);
        }
    }

    pub async fn get_room(&self, room_id: RoomId) -> Option<Room> {
        let rooms = self.rooms.read().await;
        rooms.get(&room_id).map(|r| r.snapshot())
    }

    /// Room a player is currently a member of, if any. Memberships survive
    /// disconnects, so this is the rejoin lookup. Finished rooms do not
    /// count; their memberships are stale and wait for the cleanup sweep.
    pub async fn find_room_of_player(&self, player_id: PlayerId) -> Option<Room> {
        let rooms = self.rooms.read().await;
        rooms
            .values()
            .map(|r| r.snapshot())
            .find(|r| r.status != RoomStatus::Finished && r.player(player_id).is_some())
    }

    /// Compact listing for the lobby browser, finished rooms excluded.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let rooms = self.rooms.read().await;
        let mut infos: Vec<RoomInfo> = rooms
            .values()
            .map(|r| r.snapshot())
            .filter(|r| r.status != RoomStatus::Finished)
            .map(|r| RoomInfo::from(&r))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        infos
    }

    pub async fn remove_room(&self, room_id: RoomId) -> Option<Room> {
        let mut rooms = self.rooms.write().await;
        rooms.remove(&room_id).map(|r| r.snapshot())
    }

    /// Drops finished rooms and rooms whose members have all disconnected.
    /// Returns the ids removed so the caller can announce the deletions.
    pub async fn cleanup_stale_rooms(&self) -> Vec<RoomId> {
        let mut rooms = self.rooms.write().await;
        let stale: Vec<RoomId> = rooms
            .values()
            .map(|r| r.snapshot())
            .filter(|r| {
                r.status == RoomStatus::Finished
                    || r.players.iter().all(|p| !p.is_connected)
            })
            .map(|r| r.id)
            .collect();

        for id in &stale {
            rooms.remove(id);
        }
        stale
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
