use chrono::{DateTime, Utc};
use game_types::{
    GameSettings, PlayerId, PlayerIdentity, PlayerInRoom, Room, RoomError, RoomId, RoomStatus,
    MAX_ROOM_PLAYERS, MIN_ROOM_PLAYERS,
};
use uuid::Uuid;

/// A room as held by the registry: the broadcastable snapshot plus the
/// password, which never leaves the server (mirroring how the game state
/// keeps its hidden pieces out of client snapshots).
#[derive(Debug, Clone)]
pub struct LobbyRoom {
    pub room: Room,
    password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub removed: bool,
    /// Player promoted to host because the departing player held it.
    pub new_host: Option<PlayerId>,
    pub now_empty: bool,
}

impl LobbyRoom {
    pub fn create(
        game_type: game_types::GameType,
        name: &str,
        password: Option<String>,
        max_players: u8,
        settings: GameSettings,
        host: &PlayerIdentity,
        now: DateTime<Utc>,
    ) -> Result<Self, RoomError> {
        if !(MIN_ROOM_PLAYERS..=MAX_ROOM_PLAYERS).contains(&max_players) {
            return Err(RoomError::invalid_parameters(format!(
                "max_players must be between {} and {}",
                MIN_ROOM_PLAYERS, MAX_ROOM_PLAYERS
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::invalid_parameters("room name must not be empty"));
        }

        let room = Room {
            id: Uuid::new_v4(),
            game_type,
            name: name.to_string(),
            has_password: password.is_some(),
            max_players,
            players: vec![PlayerInRoom {
                player_id: host.player_id,
                player_type: host.player_type,
                display_name: host.display_name.clone(),
                is_host: true,
                is_ready: false,
                joined_at: now.to_rfc3339(),
                is_connected: true,
            }],
            status: RoomStatus::Waiting,
            settings,
            created_at: now.to_rfc3339(),
            started_at: None,
            ended_at: None,
        };

        Ok(Self { room, password })
    }

    pub fn id(&self) -> RoomId {
        self.room.id
    }

    pub fn snapshot(&self) -> Room {
        self.room.clone()
    }

    /// Join as a new member, or re-attach an existing member after a reload.
    pub fn join(
        &mut self,
        identity: &PlayerIdentity,
        password: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RoomError> {
        // Re-joining an existing membership only flips the connected flag.
        if let Some(existing) = self
            .room
            .players
            .iter_mut()
            .find(|p| p.player_id == identity.player_id)
        {
            existing.is_connected = true;
            return Ok(());
        }

        if self.room.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyPlaying);
        }
        if self.room.is_full() {
            return Err(RoomError::RoomFull);
        }
        if let Some(expected) = &self.password {
            if password != Some(expected.as_str()) {
                return Err(RoomError::InvalidPassword);
            }
        }

        self.room.players.push(PlayerInRoom {
            player_id: identity.player_id,
            player_type: identity.player_type,
            display_name: identity.display_name.clone(),
            is_host: false,
            is_ready: false,
            joined_at: now.to_rfc3339(),
            is_connected: true,
        });
        Ok(())
    }

    /// Remove a player, reassigning host to the next-joined connected player
    /// when the host departs.
    pub fn leave(&mut self, player_id: PlayerId) -> LeaveOutcome {
        let Some(index) = self
            .room
            .players
            .iter()
            .position(|p| p.player_id == player_id)
        else {
            return LeaveOutcome {
                removed: false,
                new_host: None,
                now_empty: self.room.players.is_empty(),
            };
        };

        let was_host = self.room.players[index].is_host;
        self.room.players.remove(index);

        let mut new_host = None;
        if was_host && !self.room.players.is_empty() {
            // Players are stored in join order, so the first remaining
            // connected player is the next-joined one.
            let promoted = self
                .room
                .players
                .iter()
                .position(|p| p.is_connected)
                .unwrap_or(0);
            self.room.players[promoted].is_host = true;
            new_host = Some(self.room.players[promoted].player_id);
        }

        LeaveOutcome {
            removed: true,
            new_host,
            now_empty: self.room.players.is_empty(),
        }
    }

    pub fn set_ready(&mut self, player_id: PlayerId, is_ready: bool) -> Result<(), RoomError> {
        let player = self
            .room
            .players
            .iter_mut()
            .find(|p| p.player_id == player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;
        player.is_ready = is_ready;
        Ok(())
    }

    pub fn kick(&mut self, by: PlayerId, target: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let host = self.room.host().ok_or(RoomError::PlayerNotInRoom)?;
        if host.player_id != by {
            return Err(RoomError::NotHost);
        }
        if by == target {
            return Err(RoomError::invalid_parameters("host cannot kick themselves"));
        }
        if self.room.player(target).is_none() {
            return Err(RoomError::PlayerNotInRoom);
        }
        Ok(self.leave(target))
    }

    /// Host-only start precondition check: room waiting, every non-host
    /// player ready, and enough players present. A room created with
    /// `max_players == 1` is a solo practice room and may start alone.
    pub fn check_start(&self, by: PlayerId) -> Result<(), RoomError> {
        let host = self.room.host().ok_or(RoomError::PlayerNotInRoom)?;
        if host.player_id != by {
            return Err(RoomError::NotHost);
        }
        if self.room.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyPlaying);
        }
        if self.room.players.len() < 2 && self.room.max_players > 1 {
            return Err(RoomError::NotReady);
        }
        if self.room.players.iter().any(|p| !p.is_host && !p.is_ready) {
            return Err(RoomError::NotReady);
        }
        Ok(())
    }

    pub fn begin_countdown(&mut self) {
        debug_assert_eq!(self.room.status, RoomStatus::Waiting);
        self.room.status = RoomStatus::Countdown;
    }

    pub fn begin_playing(&mut self, now: DateTime<Utc>) {
        self.room.status = RoomStatus::Playing;
        self.room.started_at = Some(now.to_rfc3339());
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.room.status = RoomStatus::Finished;
        self.room.ended_at = Some(now.to_rfc3339());
    }

    pub fn set_connected(&mut self, player_id: PlayerId, connected: bool) {
        if let Some(player) = self
            .room
            .players
            .iter_mut()
            .find(|p| p.player_id == player_id)
        {
            player.is_connected = connected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_types::{GameType, PlayerType};

    fn identity(name: &str) -> PlayerIdentity {
        PlayerIdentity {
            player_id: Uuid::new_v4(),
            player_type: PlayerType::Guest,
            display_name: name.to_string(),
        }
    }

    fn test_room(max_players: u8) -> (LobbyRoom, PlayerIdentity) {
        let host = identity("Host");
        let room = LobbyRoom::create(
            GameType::FallingBlocks,
            "test room",
            None,
            max_players,
            GameSettings::with_seed(42),
            &host,
            Utc::now(),
        )
        .unwrap();
        (room, host)
    }

    #[test]
    fn test_create_validates_max_players() {
        let host = identity("Host");
        for bad in [0u8, 9, 200] {
            let result = LobbyRoom::create(
                GameType::Blink,
                "room",
                None,
                bad,
                GameSettings::with_seed(1),
                &host,
                Utc::now(),
            );
            assert!(matches!(
                result,
                Err(RoomError::InvalidParameters { .. })
            ));
        }
    }

    #[test]
    fn test_creator_is_sole_host() {
        let (room, host) = test_room(4);
        assert_eq!(room.room.players.len(), 1);
        let host_player = room.room.host().unwrap();
        assert_eq!(host_player.player_id, host.player_id);
        assert!(host_player.is_host);
    }

    #[test]
    fn test_join_respects_capacity() {
        let (mut room, _host) = test_room(2);
        room.join(&identity("B"), None, Utc::now()).unwrap();
        assert!(room.room.is_full());

        let result = room.join(&identity("C"), None, Utc::now());
        assert_eq!(result, Err(RoomError::RoomFull));
        assert!(room.room.players.len() <= room.room.max_players as usize);
    }

    #[test]
    fn test_join_checks_password() {
        let host = identity("Host");
        let mut room = LobbyRoom::create(
            GameType::SpeedRace,
            "secret",
            Some("hunter2".to_string()),
            4,
            GameSettings::with_seed(7),
            &host,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(
            room.join(&identity("B"), None, Utc::now()),
            Err(RoomError::InvalidPassword)
        );
        assert_eq!(
            room.join(&identity("B"), Some("wrong"), Utc::now()),
            Err(RoomError::InvalidPassword)
        );
        assert!(room.join(&identity("B"), Some("hunter2"), Utc::now()).is_ok());
    }

    #[test]
    fn test_join_rejected_once_playing() {
        let (mut room, _host) = test_room(4);
        room.begin_countdown();
        assert_eq!(
            room.join(&identity("B"), None, Utc::now()),
            Err(RoomError::AlreadyPlaying)
        );
    }

    #[test]
    fn test_rejoin_existing_member_reconnects() {
        let (mut room, _host) = test_room(4);
        let b = identity("B");
        room.join(&b, None, Utc::now()).unwrap();
        room.set_connected(b.player_id, false);
        room.begin_countdown();

        // Existing member can re-attach even while not Waiting.
        room.join(&b, None, Utc::now()).unwrap();
        assert!(room.room.player(b.player_id).unwrap().is_connected);
        assert_eq!(room.room.players.len(), 2);
    }

    #[test]
    fn test_host_reassignment_on_host_leave() {
        let (mut room, host) = test_room(4);
        let b = identity("B");
        let c = identity("C");
        room.join(&b, None, Utc::now()).unwrap();
        room.join(&c, None, Utc::now()).unwrap();
        room.set_connected(b.player_id, false);

        let outcome = room.leave(host.player_id);
        assert!(outcome.removed);
        // B joined first but is disconnected, so C gets the host flag.
        assert_eq!(outcome.new_host, Some(c.player_id));

        let hosts: Vec<_> = room.room.players.iter().filter(|p| p.is_host).collect();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].player_id, c.player_id);
    }

    #[test]
    fn test_last_leave_empties_room() {
        let (mut room, host) = test_room(4);
        let outcome = room.leave(host.player_id);
        assert!(outcome.now_empty);
        assert_eq!(outcome.new_host, None);
    }

    #[test]
    fn test_start_requires_host() {
        let (mut room, _host) = test_room(4);
        let b = identity("B");
        room.join(&b, None, Utc::now()).unwrap();
        assert_eq!(room.check_start(b.player_id), Err(RoomError::NotHost));
    }

    #[test]
    fn test_start_requires_all_non_host_ready() {
        let (mut room, host) = test_room(4);
        let b = identity("B");
        room.join(&b, None, Utc::now()).unwrap();

        assert_eq!(room.check_start(host.player_id), Err(RoomError::NotReady));

        room.set_ready(b.player_id, true).unwrap();
        assert!(room.check_start(host.player_id).is_ok());
    }

    #[test]
    fn test_start_requires_two_players_unless_solo_room() {
        let (room, host) = test_room(4);
        assert_eq!(room.check_start(host.player_id), Err(RoomError::NotReady));

        let (solo, solo_host) = test_room(1);
        assert!(solo.check_start(solo_host.player_id).is_ok());
    }

    #[test]
    fn test_kick_is_host_only() {
        let (mut room, host) = test_room(4);
        let b = identity("B");
        let c = identity("C");
        room.join(&b, None, Utc::now()).unwrap();
        room.join(&c, None, Utc::now()).unwrap();

        assert_eq!(
            room.kick(b.player_id, c.player_id),
            Err(RoomError::NotHost)
        );
        let outcome = room.kick(host.player_id, b.player_id).unwrap();
        assert!(outcome.removed);
        assert!(room.room.player(b.player_id).is_none());
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        let (mut room, _host) = test_room(1);
        assert_eq!(room.room.status, RoomStatus::Waiting);
        room.begin_countdown();
        assert_eq!(room.room.status, RoomStatus::Countdown);
        room.begin_playing(Utc::now());
        assert_eq!(room.room.status, RoomStatus::Playing);
        assert!(room.room.started_at.is_some());
        room.finish(Utc::now());
        assert_eq!(room.room.status, RoomStatus::Finished);
        assert!(room.room.ended_at.is_some());
    }
}
