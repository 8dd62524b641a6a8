use game_types::{PlayerId, PlayerIdentity, RoomId, ServerMessage};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Option<PlayerIdentity>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub room_id: Option<RoomId>,
    pub spectating: Option<RoomId>,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            identity: None,
            connected_at: now,
            last_activity: now,
            room_id: None,
            spectating: None,
            sender,
        };

        (connection, receiver)
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.identity.as_ref().map(|i| i.player_id)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// All live sockets, plus the player-to-socket index used for routing.
/// A player has at most one live connection; identifying from a second
/// socket takes the identity over and the stale socket is dropped.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    player_to_connection: RwLock<HashMap<PlayerId, ConnectionId>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            player_to_connection: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) -> Option<Connection> {
        let conn = {
            let mut connections = self.connections.write().await;
            connections.remove(&id)
        };

        if let Some(player_id) = conn.as_ref().and_then(|c| c.player_id()) {
            let mut player_to_connection = self.player_to_connection.write().await;
            // Only drop the index entry if it still points at this socket;
            // a takeover may already have redirected it.
            if player_to_connection.get(&player_id) == Some(&id) {
                player_to_connection.remove(&player_id);
            }
        }

        conn
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    pub async fn get_connection_by_player(&self, player_id: PlayerId) -> Option<Connection> {
        let player_to_connection = self.player_to_connection.read().await;
        if let Some(connection_id) = player_to_connection.get(&player_id) {
            let connections = self.connections.read().await;
            connections.get(connection_id).cloned()
        } else {
            None
        }
    }

    /// Binds an identity to a socket. If the player already had a live
    /// socket, that one is superseded and its id returned so the caller
    /// can close it.
    pub async fn identify_connection(
        &self,
        id: ConnectionId,
        identity: PlayerIdentity,
    ) -> Result<Option<ConnectionId>, String> {
        let player_id = identity.player_id;

        {
            let mut connections = self.connections.write().await;
            if let Some(connection) = connections.get_mut(&id) {
                connection.identity = Some(identity);
            } else {
                return Err("Connection not found".to_string());
            }
        }

        let superseded = {
            let mut player_to_connection = self.player_to_connection.write().await;
            player_to_connection.insert(player_id, id)
        };

        Ok(superseded.filter(|old| *old != id))
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&id) {
            connection.send_message(message)
        } else {
            Err("Connection not found".to_string())
        }
    }

    pub async fn send_to_player(
        &self,
        player_id: PlayerId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connection_id = {
            let player_to_connection = self.player_to_connection.read().await;
            player_to_connection.get(&player_id).copied()
        };

        if let Some(connection_id) = connection_id {
            self.send_to_connection(connection_id, message).await
        } else {
            Err("Player not connected".to_string())
        }
    }

    /// Fans a message out to everyone watching a room: seated players and
    /// spectators alike.
    pub async fn send_to_room(&self, room_id: RoomId, message: ServerMessage) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if connection.room_id == Some(room_id) || connection.spectating == Some(room_id) {
                let _ = connection.send_message(message.clone());
            }
        }
    }

    pub async fn send_to_room_except(
        &self,
        room_id: RoomId,
        except_connection: ConnectionId,
        message: ServerMessage,
    ) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if connection.id != except_connection
                && (connection.room_id == Some(room_id)
                    || connection.spectating == Some(room_id))
            {
                let _ = connection.send_message(message.clone());
            }
        }
    }

    /// Sends to identified connections that are not seated in any room:
    /// the lobby audience for room-list updates.
    pub async fn broadcast_lobby(&self, message: ServerMessage) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            if connection.identity.is_some() && connection.room_id.is_none() {
                let _ = connection.send_message(message.clone());
            }
        }
    }

    pub async fn set_connection_room(&self, id: ConnectionId, room_id: Option<RoomId>) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.room_id = room_id;
        }
    }

    pub async fn set_spectating(&self, id: ConnectionId, room_id: Option<RoomId>) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.spectating = room_id;
        }
    }

    pub async fn spectator_count(&self, room_id: RoomId) -> u32 {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.spectating == Some(room_id))
            .count() as u32
    }

    pub async fn lobby_players(&self) -> Vec<PlayerIdentity> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.room_id.is_none())
            .filter_map(|conn| conn.identity.clone())
            .collect()
    }

    pub async fn cleanup_inactive_connections(&self, timeout: Duration) -> Vec<Connection> {
        let inactive: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout))
                .map(|conn| conn.id)
                .collect()
        };

        let mut removed = Vec::new();
        for connection_id in inactive {
            tracing::info!("Removing inactive connection: {}", connection_id);
            if let Some(conn) = self.remove_connection(connection_id).await {
                removed.push(conn);
            }
        }
        removed
    }

    // Test helper methods
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn player_connection_count(&self) -> usize {
        let player_connections = self.player_to_connection.read().await;
        player_connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
