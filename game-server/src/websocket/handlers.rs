use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::identity::IdentityResolver;
use crate::matchmaking::MatchmakingQueue;
use crate::room_registry::RoomRegistry;
use crate::session_runtime::SessionManager;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_types::{
    ClientMessage, GameSettings, GameSettingsRequest, GameType, PlayerId, PlayerIdentity, RoomId,
    RoomStatus, ServerMessage,
};

pub const MAX_CHAT_LEN: usize = 256;
pub const MAX_DIFFICULTY: u8 = 5;

/// Per-connection dispatcher. One handler lives for the lifetime of a
/// socket and routes every client message to the owning service.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connections: Arc<ConnectionManager>,
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionManager>,
    matchmaking: Arc<MatchmakingQueue>,
    identity_resolver: Arc<IdentityResolver>,
    countdown_seconds: u32,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connections: Arc<ConnectionManager>,
        registry: Arc<RoomRegistry>,
        sessions: Arc<SessionManager>,
        matchmaking: Arc<MatchmakingQueue>,
        identity_resolver: Arc<IdentityResolver>,
        countdown_seconds: u32,
    ) -> Self {
        Self {
            connection_id,
            connections,
            registry,
            sessions,
            matchmaking,
            identity_resolver,
            countdown_seconds,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connections.update_activity(self.connection_id).await;

        match message {
            ClientMessage::Identify {
                user_id,
                device_id,
                display_name,
            } => {
                self.handle_identify(user_id, &device_id, &display_name)
                    .await
            }
            ClientMessage::CreateRoom {
                game_type,
                name,
                password,
                max_players,
                settings,
            } => {
                self.handle_create_room(game_type, &name, password, max_players, settings)
                    .await
            }
            ClientMessage::JoinRoom { room_id, password } => {
                self.handle_join_room(room_id, password.as_deref()).await
            }
            ClientMessage::LeaveRoom => self.handle_leave_room().await,
            ClientMessage::SetReady { is_ready } => self.handle_set_ready(is_ready).await,
            ClientMessage::StartGame => self.handle_start_game().await,
            ClientMessage::KickPlayer { player_id } => self.handle_kick_player(player_id).await,
            ClientMessage::QueueForMatch {
                game_type,
                skill_tier,
            } => self.handle_queue_for_match(game_type, skill_tier).await,
            ClientMessage::CancelMatch => self.handle_cancel_match().await,
            ClientMessage::GameInput { key } => self.handle_game_input(key).await,
            ClientMessage::GameReady => self.handle_game_ready().await,
            ClientMessage::ChatSend { message } => self.handle_chat_send(message).await,
            ClientMessage::SpectateRoom { room_id } => self.handle_spectate_room(room_id).await,
            ClientMessage::StopSpectating => self.handle_stop_spectating().await,
            ClientMessage::Heartbeat => Ok(()),
        }
    }

    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);

        let Some(connection) = self.connections.get_connection(self.connection_id).await else {
            return;
        };

        if let Some(player_id) = connection.player_id() {
            if let Err(e) = self.matchmaking.remove_player(player_id).await {
                info!(
                    "Player {} not in queue during disconnect: {}",
                    player_id, e
                );
            }

            if let Some(room_id) = connection.room_id {
                self.disconnect_from_room(room_id, player_id).await;
            }
        }

        if let Some(room_id) = connection.spectating {
            self.broadcast_spectator_count(room_id).await;
        }
    }

    /// A dropped socket keeps its seat while the game (or countdown) is
    /// live so the player can rejoin; in a waiting room it simply leaves.
    async fn disconnect_from_room(&self, room_id: RoomId, player_id: PlayerId) {
        let status = self.registry.get_room(room_id).await.map(|r| r.status);
        match status {
            Some(RoomStatus::Playing) | Some(RoomStatus::Countdown) => {
                self.registry.set_connected(room_id, player_id, false).await;
                if self.sessions.is_running(room_id).await {
                    let _ = self.sessions.set_connected(room_id, player_id, false).await;
                } else {
                    self.connections
                        .send_to_room(room_id, ServerMessage::PlayerDisconnected { player_id })
                        .await;
                }
            }
            Some(_) => {
                self.announce_leave(room_id, player_id).await;
            }
            None => {}
        }
    }

    async fn handle_identify(
        &self,
        user_id: Option<uuid::Uuid>,
        device_id: &str,
        display_name: &str,
    ) -> Result<(), String> {
        let identity = match self
            .identity_resolver
            .resolve(user_id, device_id, display_name)
        {
            Ok(identity) => identity,
            Err(err) => {
                return self
                    .send_message(ServerMessage::Error {
                        message: err.to_string(),
                    })
                    .await;
            }
        };

        let superseded = self
            .connections
            .identify_connection(self.connection_id, identity.clone())
            .await?;
        if let Some(old_connection) = superseded {
            info!(
                "Player {} re-identified, superseding connection {}",
                identity.player_id, old_connection
            );
            let _ = self
                .connections
                .send_to_connection(
                    old_connection,
                    ServerMessage::Error {
                        message: "This identity signed in from another connection".to_string(),
                    },
                )
                .await;
            self.connections.remove_connection(old_connection).await;
        }

        self.send_message(ServerMessage::Identified {
            identity: identity.clone(),
        })
        .await?;

        // A surviving membership pulls the client straight back in.
        if let Some(room) = self.registry.find_room_of_player(identity.player_id).await {
            let room_id = room.id;
            self.connections
                .set_connection_room(self.connection_id, Some(room_id))
                .await;
            self.registry
                .set_connected(room_id, identity.player_id, true)
                .await;

            let game = self.sessions.state_snapshot(room_id).await;
            if self.sessions.is_running(room_id).await {
                let _ = self
                    .sessions
                    .set_connected(room_id, identity.player_id, true)
                    .await;
            }
            self.send_message(ServerMessage::RoomRejoined {
                room_id,
                room,
                game,
            })
            .await
        } else {
            let rooms = self.registry.list_rooms().await;
            self.send_message(ServerMessage::LobbyRooms { rooms })
                .await?;
            self.broadcast_lobby_players().await;
            Ok(())
        }
    }

    async fn handle_create_room(
        &self,
        game_type: GameType,
        name: &str,
        password: Option<String>,
        max_players: u8,
        settings: Option<GameSettingsRequest>,
    ) -> Result<(), String> {
        let Some(identity) = self.require_lobby_identity().await? else {
            return Ok(());
        };

        let settings = build_settings(settings);
        match self
            .registry
            .create_room(game_type, name, password, max_players, settings, &identity)
            .await
        {
            Ok(room) => {
                let room_id = room.id;
                self.connections
                    .set_connection_room(self.connection_id, Some(room_id))
                    .await;
                info!(
                    "Player {} created room {} ({})",
                    identity.player_id,
                    room_id,
                    game_type.as_str()
                );
                self.send_message(ServerMessage::RoomCreated { room }).await?;
                self.broadcast_lobby_rooms().await;
                self.broadcast_lobby_players().await;
                Ok(())
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_join_room(
        &self,
        room_id: RoomId,
        password: Option<&str>,
    ) -> Result<(), String> {
        let Some(identity) = self.require_lobby_identity().await? else {
            return Ok(());
        };

        match self.registry.join_room(room_id, &identity, password).await {
            Ok(room) => {
                self.connections
                    .set_connection_room(self.connection_id, Some(room_id))
                    .await;

                if let Some(player) = room.player(identity.player_id).cloned() {
                    self.connections
                        .send_to_room_except(
                            room_id,
                            self.connection_id,
                            ServerMessage::PlayerJoined { room_id, player },
                        )
                        .await;
                }
                self.send_message(ServerMessage::RoomUpdated { room }).await?;
                self.broadcast_lobby_rooms().await;
                self.broadcast_lobby_players().await;
                Ok(())
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_leave_room(&self) -> Result<(), String> {
        let Some((identity, room_id)) = self.seated_identity().await else {
            return self.send_error("You are not in a room").await;
        };

        if self.sessions.is_running(room_id).await {
            // Leaving mid-game abandons the seat; the game keeps the slot
            // until it ends.
            let _ = self
                .sessions
                .set_connected(room_id, identity.player_id, false)
                .await;
        }
        self.announce_leave(room_id, identity.player_id).await;
        Ok(())
    }

    /// Shared removal path for LeaveRoom, kicks and lobby disconnects.
    async fn announce_leave(&self, room_id: RoomId, player_id: PlayerId) {
        if let Some(conn) = self.connections.get_connection_by_player(player_id).await {
            self.connections.set_connection_room(conn.id, None).await;
        }

        match self.registry.leave_room(room_id, player_id).await {
            Ok((outcome, Some(room))) => {
                self.connections
                    .send_to_room(room_id, ServerMessage::PlayerLeft { room_id, player_id })
                    .await;
                if outcome.new_host.is_some() {
                    self.connections
                        .send_to_room(room_id, ServerMessage::RoomUpdated { room })
                        .await;
                }
            }
            Ok((_, None)) => {
                self.connections
                    .broadcast_lobby(ServerMessage::RoomDeleted { room_id })
                    .await;
            }
            Err(err) => {
                warn!("Leave from room {} failed: {}", room_id, err);
            }
        }
        self.broadcast_lobby_rooms().await;
        self.broadcast_lobby_players().await;
    }

    async fn handle_set_ready(&self, is_ready: bool) -> Result<(), String> {
        let Some((identity, room_id)) = self.seated_identity().await else {
            return self.send_error("You are not in a room").await;
        };

        match self
            .registry
            .set_ready(room_id, identity.player_id, is_ready)
            .await
        {
            Ok(_) => {
                self.connections
                    .send_to_room(
                        room_id,
                        ServerMessage::PlayerReady {
                            room_id,
                            player_id: identity.player_id,
                            is_ready,
                        },
                    )
                    .await;
                Ok(())
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_start_game(&self) -> Result<(), String> {
        let Some((identity, room_id)) = self.seated_identity().await else {
            return self.send_error("You are not in a room").await;
        };

        match self
            .registry
            .start_countdown(room_id, identity.player_id)
            .await
        {
            Ok(room) => {
                self.connections
                    .send_to_room(room_id, ServerMessage::RoomUpdated { room })
                    .await;
                self.broadcast_lobby_rooms().await;
                self.sessions.launch(room_id, self.countdown_seconds);
                Ok(())
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_kick_player(&self, target: PlayerId) -> Result<(), String> {
        let Some((identity, room_id)) = self.seated_identity().await else {
            return self.send_error("You are not in a room").await;
        };

        match self.registry.kick(room_id, identity.player_id, target).await {
            Ok(room) => {
                // The kicked player still has a room-scoped connection, so
                // tell everyone (them included) before unseating them.
                self.connections
                    .send_to_room(
                        room_id,
                        ServerMessage::PlayerKicked {
                            room_id,
                            player_id: target,
                        },
                    )
                    .await;
                if let Some(conn) = self.connections.get_connection_by_player(target).await {
                    self.connections.set_connection_room(conn.id, None).await;
                }
                self.connections
                    .send_to_room(room_id, ServerMessage::RoomUpdated { room })
                    .await;
                self.broadcast_lobby_rooms().await;
                self.broadcast_lobby_players().await;
                Ok(())
            }
            Err(err) => self.send_error(err.to_string()).await,
        }
    }

    async fn handle_queue_for_match(
        &self,
        game_type: GameType,
        skill_tier: u8,
    ) -> Result<(), String> {
        let Some(identity) = self.require_lobby_identity().await? else {
            return Ok(());
        };

        match self
            .matchmaking
            .add_player(identity.player_id, game_type, skill_tier)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => self.send_error(err).await,
        }
    }

    async fn handle_cancel_match(&self) -> Result<(), String> {
        let Some(identity) = self.identity().await else {
            return self.send_error("Identify first").await;
        };
        // Cancelling an absent queue entry is a no-op.
        let _ = self.matchmaking.remove_player(identity.player_id).await;
        Ok(())
    }

    async fn handle_game_input(&self, key: char) -> Result<(), String> {
        let Some(connection) = self.connections.get_connection(self.connection_id).await else {
            return Ok(());
        };
        if connection.spectating.is_some() {
            return self
                .send_message(ServerMessage::GameInputRejected {
                    reason: "spectators cannot play".to_string(),
                })
                .await;
        }
        let (Some(player_id), Some(room_id)) = (connection.player_id(), connection.room_id) else {
            return self
                .send_message(ServerMessage::GameInputRejected {
                    reason: "you are not in a game".to_string(),
                })
                .await;
        };

        if let Err(reason) = self.sessions.input(room_id, player_id, key).await {
            return self
                .send_message(ServerMessage::GameInputRejected { reason })
                .await;
        }
        Ok(())
    }

    /// Client-side load complete. Re-attaches the player to a running
    /// game, for example after the page came back from a reload.
    async fn handle_game_ready(&self) -> Result<(), String> {
        if let Some((identity, room_id)) = self.seated_identity().await {
            if self.sessions.is_running(room_id).await {
                let _ = self
                    .sessions
                    .set_connected(room_id, identity.player_id, true)
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_chat_send(&self, message: String) -> Result<(), String> {
        let Some(connection) = self.connections.get_connection(self.connection_id).await else {
            return Ok(());
        };
        let Some(identity) = connection.identity.clone() else {
            return self
                .send_message(ServerMessage::ChatError {
                    message: "Identify before chatting".to_string(),
                })
                .await;
        };

        let trimmed = message.trim();
        if trimmed.is_empty() {
            return self
                .send_message(ServerMessage::ChatError {
                    message: "Message must not be empty".to_string(),
                })
                .await;
        }
        if trimmed.chars().count() > MAX_CHAT_LEN {
            return self
                .send_message(ServerMessage::ChatError {
                    message: format!("Message must be at most {} characters", MAX_CHAT_LEN),
                })
                .await;
        }

        let chat = ServerMessage::ChatMessage {
            player_id: identity.player_id,
            display_name: identity.display_name.clone(),
            message: trimmed.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };

        // Chat goes to the room you are in or watching, otherwise to the
        // lobby at large.
        if let Some(room_id) = connection.room_id.or(connection.spectating) {
            self.connections.send_to_room(room_id, chat).await;
        } else {
            self.connections.broadcast_lobby(chat).await;
        }
        Ok(())
    }

    async fn handle_spectate_room(&self, room_id: RoomId) -> Result<(), String> {
        let Some(connection) = self.connections.get_connection(self.connection_id).await else {
            return Ok(());
        };
        if connection.identity.is_none() {
            return self.send_error("Identify first").await;
        }
        if connection.room_id.is_some() {
            return self.send_error("Leave your room before spectating").await;
        }

        let Some(room) = self.registry.get_room(room_id).await else {
            return self.send_error("room not found").await;
        };
        if room.status != RoomStatus::Playing {
            return self.send_error("Room has no game in progress").await;
        }

        self.connections
            .set_spectating(self.connection_id, Some(room_id))
            .await;
        self.send_message(ServerMessage::SpectatorJoined { room_id })
            .await?;
        if let Some(state) = self.sessions.state_snapshot(room_id).await {
            self.send_message(ServerMessage::GameStateUpdate { state })
                .await?;
        }
        self.broadcast_spectator_count(room_id).await;
        Ok(())
    }

    async fn handle_stop_spectating(&self) -> Result<(), String> {
        let Some(connection) = self.connections.get_connection(self.connection_id).await else {
            return Ok(());
        };
        let Some(room_id) = connection.spectating else {
            return Ok(());
        };

        self.connections
            .set_spectating(self.connection_id, None)
            .await;
        self.broadcast_spectator_count(room_id).await;
        Ok(())
    }

    async fn broadcast_spectator_count(&self, room_id: RoomId) {
        let count = self.connections.spectator_count(room_id).await;
        self.connections
            .send_to_room(room_id, ServerMessage::SpectatorCount { room_id, count })
            .await;
    }

    async fn broadcast_lobby_rooms(&self) {
        let rooms = self.registry.list_rooms().await;
        self.connections
            .broadcast_lobby(ServerMessage::LobbyRooms { rooms })
            .await;
    }

    async fn broadcast_lobby_players(&self) {
        let players = self.connections.lobby_players().await;
        self.connections
            .broadcast_lobby(ServerMessage::LobbyPlayers { players })
            .await;
    }

    async fn identity(&self) -> Option<PlayerIdentity> {
        self.connections
            .get_connection(self.connection_id)
            .await
            .and_then(|c| c.identity)
    }

    async fn seated_identity(&self) -> Option<(PlayerIdentity, RoomId)> {
        let connection = self.connections.get_connection(self.connection_id).await?;
        let identity = connection.identity?;
        let room_id = connection.room_id?;
        Some((identity, room_id))
    }

    /// Identity for actions that require being identified and out of any
    /// room. Sends the rejection itself and yields None when unmet.
    async fn require_lobby_identity(&self) -> Result<Option<PlayerIdentity>, String> {
        let Some(connection) = self.connections.get_connection(self.connection_id).await else {
            return Ok(None);
        };
        let Some(identity) = connection.identity else {
            self.send_error("Identify first").await?;
            return Ok(None);
        };
        if connection.room_id.is_some() {
            self.send_error("You are already in a room").await?;
            return Ok(None);
        }
        Ok(Some(identity))
    }

    async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connections
            .send_to_connection(self.connection_id, message)
            .await
    }

    async fn send_error(&self, message: impl Into<String>) -> Result<(), String> {
        self.send_message(ServerMessage::Error {
            message: message.into(),
        })
        .await
    }
}

/// Fills a creation request out to full settings. The seed is always
/// generated server-side; clients never choose it.
pub fn build_settings(request: Option<GameSettingsRequest>) -> GameSettings {
    let mut settings = GameSettings::with_seed(rand::random());
    if let Some(request) = request {
        settings.lesson_id = request.lesson_id;
        if let Some(difficulty) = request.difficulty {
            settings.difficulty = difficulty.clamp(1, MAX_DIFFICULTY);
        }
        if let Some(time_limit_ms) = request.time_limit_ms {
            settings.time_limit_ms = time_limit_ms.clamp(30_000, 600_000);
        }
    }
    settings
}
