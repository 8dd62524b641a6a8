use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{error, info, warn};

use game_core::engine::{Game, InputOutcome};
use game_core::ranking::build_session;
use game_types::{GameState, PlayerId, RoomId, ServerMessage};

use crate::recorder::SessionRecorder;
use crate::room_registry::RoomRegistry;
use crate::websocket::connection::ConnectionManager;

#[derive(Debug)]
enum SessionCommand {
    Input { player_id: PlayerId, key: char },
    SetConnected { player_id: PlayerId, connected: bool },
    Stop,
}

struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<GameState>,
}

/// Runs one tokio task per live game. The task owns the `Game`
/// exclusively; everything else talks to it through commands and reads
/// it through a watch snapshot, so keystrokes never contend with ticks
/// on a lock.
pub struct SessionManager {
    sessions: RwLock<HashMap<RoomId, SessionHandle>>,
    connections: Arc<ConnectionManager>,
    registry: Arc<RoomRegistry>,
    recorder: Arc<SessionRecorder>,
    tick_interval: Duration,
    rejoin_grace: Duration,
}

impl SessionManager {
    pub fn new(
        connections: Arc<ConnectionManager>,
        registry: Arc<RoomRegistry>,
        recorder: Arc<SessionRecorder>,
        tick_interval_ms: u64,
        rejoin_grace_seconds: u64,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            connections,
            registry,
            recorder,
            tick_interval: Duration::from_millis(tick_interval_ms.max(10)),
            rejoin_grace: Duration::from_secs(rejoin_grace_seconds),
        }
    }

    /// Countdown plus game start for a room already moved to Countdown.
    /// Spawned so the caller returns to its socket loop immediately.
    pub fn launch(self: &Arc<Self>, room_id: RoomId, countdown_seconds: u32) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            for remaining in (1..=countdown_seconds).rev() {
                manager
                    .connections
                    .send_to_room(
                        room_id,
                        ServerMessage::GameCountdown { seconds: remaining },
                    )
                    .await;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            if let Err(err) = manager.start_session(room_id).await {
                error!("Failed to start game in room {}: {}", room_id, err);
                manager
                    .connections
                    .send_to_room(
                        room_id,
                        ServerMessage::GameError {
                            message: err.to_string(),
                        },
                    )
                    .await;
            }
        });
    }

    async fn start_session(self: &Arc<Self>, room_id: RoomId) -> Result<(), String> {
        let room = self
            .registry
            .begin_playing(room_id)
            .await
            .map_err(|e| e.to_string())?;
        let game = Game::new(&room, Utc::now());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(game.state.clone());

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                room_id,
                SessionHandle {
                    commands: command_tx,
                    state: state_rx,
                },
            );
        }

        self.connections
            .send_to_room(
                room_id,
                ServerMessage::GameStarted {
                    state: game.state.clone(),
                },
            )
            .await;
        info!(
            "Game started in room {} ({}, {} players)",
            room_id,
            room.game_type.as_str(),
            room.players.len()
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_session(room_id, game, command_rx, state_tx).await;
        });
        Ok(())
    }

    async fn run_session(
        self: Arc<Self>,
        room_id: RoomId,
        mut game: Game,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        state_tx: watch::Sender<GameState>,
    ) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; consume it so the
        // clock starts counting from here.
        ticker.tick().await;

        let mut abandoned_since: Option<Instant> = None;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(SessionCommand::Input { player_id, key }) => {
                            match game.handle_input(player_id, key) {
                                InputOutcome::Accepted => {
                                    if let Some(player) = game.state.players.get(&player_id) {
                                        self.connections
                                            .send_to_room(
                                                room_id,
                                                ServerMessage::GamePlayerUpdate {
                                                    room_id,
                                                    player: player.clone(),
                                                },
                                            )
                                            .await;
                                    }
                                    if game.is_over() {
                                        break;
                                    }
                                }
                                InputOutcome::Rejected { reason } => {
                                    let _ = self
                                        .connections
                                        .send_to_player(
                                            player_id,
                                            ServerMessage::GameInputRejected { reason },
                                        )
                                        .await;
                                    // A final error can knock out the last
                                    // live player and end the game.
                                    if game.is_over() {
                                        break;
                                    }
                                }
                            }
                        }
                        Some(SessionCommand::SetConnected { player_id, connected }) => {
                            game.set_connected(player_id, connected, Utc::now());
                            let message = if connected {
                                ServerMessage::PlayerConnected { player_id }
                            } else {
                                ServerMessage::PlayerDisconnected { player_id }
                            };
                            self.connections.send_to_room(room_id, message).await;
                            if connected {
                                abandoned_since = None;
                            }
                        }
                        Some(SessionCommand::Stop) | None => {
                            warn!("Session for room {} stopped externally", room_id);
                            break;
                        }
                    }
                    let _ = state_tx.send(game.state.clone());
                }
                _ = ticker.tick() => {
                    let finished = game.tick(self.tick_interval.as_millis() as u64);
                    let _ = state_tx.send(game.state.clone());
                    self.connections
                        .send_to_room(
                            room_id,
                            ServerMessage::GameStateUpdate {
                                state: game.state.clone(),
                            },
                        )
                        .await;
                    if finished {
                        break;
                    }

                    // A game every player has walked away from is ended
                    // once the rejoin grace window closes.
                    if game.state.all_disconnected() {
                        let since = abandoned_since.get_or_insert_with(Instant::now);
                        if since.elapsed() > self.rejoin_grace {
                            info!("Room {} abandoned, ending game", room_id);
                            break;
                        }
                    } else {
                        abandoned_since = None;
                    }
                }
            }
        }

        self.finish_session(room_id, game).await;
    }

    async fn finish_session(&self, room_id: RoomId, game: Game) {
        {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&room_id);
        }
        if let Err(err) = self.registry.finish_room(room_id).await {
            warn!("Could not mark room {} finished: {}", room_id, err);
        }

        let session = build_session(&game.state, room_id, Utc::now());
        self.connections
            .send_to_room(
                room_id,
                ServerMessage::GameEnded {
                    session: session.clone(),
                },
            )
            .await;
        info!(
            "Game ended in room {} after {}ms, winner: {:?}",
            room_id, session.data.duration_ms, session.winner
        );

        self.recorder.record(&session).await;

        let rooms = self.registry.list_rooms().await;
        self.connections
            .broadcast_lobby(ServerMessage::LobbyRooms { rooms })
            .await;
    }

    pub async fn input(&self, room_id: RoomId, player_id: PlayerId, key: char) -> Result<(), String> {
        self.send_command(room_id, SessionCommand::Input { player_id, key })
            .await
    }

    pub async fn set_connected(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        connected: bool,
    ) -> Result<(), String> {
        self.send_command(
            room_id,
            SessionCommand::SetConnected {
                player_id,
                connected,
            },
        )
        .await
    }

    pub async fn stop(&self, room_id: RoomId) -> Result<(), String> {
        self.send_command(room_id, SessionCommand::Stop).await
    }

    async fn send_command(&self, room_id: RoomId, command: SessionCommand) -> Result<(), String> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(&room_id)
            .ok_or_else(|| "No game running in this room".to_string())?;
        handle
            .commands
            .send(command)
            .map_err(|_| "Game has already ended".to_string())
    }

    /// Latest state snapshot, for rejoining players and new spectators.
    pub async fn state_snapshot(&self, room_id: RoomId) -> Option<GameState> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&room_id)
            .map(|handle| handle.state.borrow().clone())
    }

    pub async fn is_running(&self, room_id: RoomId) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(&room_id)
    }

    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::ConnectionId;
    use game_persistence::connection::connect_to_memory_database;
    use game_types::{
        GameSettings, GameSpecificState, GameType, PlayerIdentity, PlayerType, RoomStatus,
        ServerMessage,
    };
    use migration::{Migrator, MigratorTrait};
    use uuid::Uuid;

    async fn setup() -> (Arc<SessionManager>, Arc<ConnectionManager>, Arc<RoomRegistry>) {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let connections = Arc::new(ConnectionManager::new());
        let registry = Arc::new(RoomRegistry::new());
        let recorder = Arc::new(SessionRecorder::new(db));
        let manager = Arc::new(SessionManager::new(
            connections.clone(),
            registry.clone(),
            recorder,
            20,
            1,
        ));
        (manager, connections, registry)
    }

    fn identity(name: &str) -> PlayerIdentity {
        PlayerIdentity {
            player_id: Uuid::new_v4(),
            player_type: PlayerType::Guest,
            display_name: name.to_string(),
        }
    }

    async fn seat_player(
        connections: &ConnectionManager,
        who: &PlayerIdentity,
        room_id: RoomId,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let conn_id = ConnectionId::new();
        let receiver = connections.create_connection(conn_id).await;
        connections
            .identify_connection(conn_id, who.clone())
            .await
            .unwrap();
        connections.set_connection_room(conn_id, Some(room_id)).await;
        (conn_id, receiver)
    }

    /// Solo speed race driven end to end through the runtime: countdown,
    /// start, typed passage, GameEnded.
    #[tokio::test]
    async fn test_solo_race_runs_to_completion() {
        let (manager, connections, registry) = setup().await;
        let host = identity("Solo");
        let room = registry
            .create_room(
                GameType::SpeedRace,
                "solo run",
                None,
                1,
                GameSettings::with_seed(42),
                &host,
            )
            .await
            .unwrap();
        let (_conn, mut receiver) = seat_player(&connections, &host, room.id).await;

        registry
            .start_countdown(room.id, host.player_id)
            .await
            .unwrap();
        manager.launch(room.id, 0);

        // Wait for the session task to come up.
        let mut passage = None;
        for _ in 0..100 {
            if let Some(state) = manager.state_snapshot(room.id).await {
                if let GameSpecificState::SpeedRace { passage: p } = &state.game_specific {
                    passage = Some(p.clone());
                }
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let passage = passage.expect("session should be running");

        for key in passage.chars() {
            manager.input(room.id, host.player_id, key).await.unwrap();
        }

        let mut ended = None;
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(200), receiver.recv()).await {
                Ok(Some(ServerMessage::GameEnded { session })) => {
                    ended = Some(session);
                    break;
                }
                Ok(Some(_)) => continue,
                _ => break,
            }
        }

        let session = ended.expect("game should end after the passage is typed");
        assert_eq!(session.winner, Some(host.player_id));
        assert_eq!(session.players.len(), 1);
        assert!(session.players[0].score > 0);

        let room_after = registry.get_room(room.id).await.unwrap();
        assert_eq!(room_after.status, RoomStatus::Finished);
        assert!(!manager.is_running(room.id).await);
    }

    #[tokio::test]
    async fn test_input_without_session_is_rejected() {
        let (manager, _connections, _registry) = setup().await;
        let result = manager.input(Uuid::new_v4(), Uuid::new_v4(), 'a').await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_abandoned_game_ends_after_grace() {
        let (manager, connections, registry) = setup().await;
        let host = identity("Ghost");
        let room = registry
            .create_room(
                GameType::FallingBlocks,
                "abandoned",
                None,
                1,
                GameSettings::with_seed(7),
                &host,
            )
            .await
            .unwrap();
        let (_conn, _receiver) = seat_player(&connections, &host, room.id).await;

        registry
            .start_countdown(room.id, host.player_id)
            .await
            .unwrap();
        manager.launch(room.id, 0);

        for _ in 0..100 {
            if manager.is_running(room.id).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        manager
            .set_connected(room.id, host.player_id, false)
            .await
            .unwrap();

        // Grace is 1s in this setup; the session should wind down well
        // before the 120s game clock runs out.
        let deadline = Instant::now() + Duration::from_secs(5);
        while manager.is_running(room.id).await && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!manager.is_running(room.id).await);
        assert_eq!(
            registry.get_room(room.id).await.unwrap().status,
            RoomStatus::Finished
        );
    }
}
