use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::identity::IdentityResolver;
use crate::matchmaking::MatchmakingQueue;
use crate::room_registry::RoomRegistry;
use crate::session_runtime::SessionManager;
use game_types::{ClientMessage, ServerMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

#[allow(clippy::too_many_arguments)]
pub async fn handle_connection(
    websocket: WebSocket,
    connections: Arc<ConnectionManager>,
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionManager>,
    matchmaking: Arc<MatchmakingQueue>,
    identity_resolver: Arc<IdentityResolver>,
    countdown_seconds: u32,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let rate_limiter = RateLimiter::new();

    let message_receiver = connections.create_connection(connection_id).await;

    let message_handler = MessageHandler::new(
        connection_id,
        connections.clone(),
        registry,
        sessions,
        matchmaking,
        identity_resolver,
        countdown_seconds,
    );

    // Handle incoming messages
    let incoming_handler = {
        let message_handler = message_handler.clone();
        let mut rate_limiter = rate_limiter.clone();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(e) =
                            handle_message(msg, &mut rate_limiter, &message_handler, connection_id)
                                .await
                        {
                            error!("Error handling message for {}: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {:?}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!("Failed to send message to {}: {:?}", connection_id, e);
                    break;
                }
            }
        }
    };

    // Run both handlers concurrently
    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    // Cleanup connection
    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    let removed = connections.remove_connection(connection_id).await;

    // An identified lobby player dropping off changes the roster.
    if removed.is_some_and(|conn| conn.identity.is_some() && conn.room_id.is_none()) {
        let players = connections.lobby_players().await;
        connections
            .broadcast_lobby(ServerMessage::LobbyPlayers { players })
            .await;
    }
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !rate_limiter.check_rate_limit() {
        warn!("Rate limit exceeded for connection {}", connection_id);
        return Err("Rate limit exceeded".into());
    }

    // Only handle text messages
    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| "Invalid text message")?;

    let client_message: ClientMessage =
        serde_json::from_str(text).map_err(|e| format!("Invalid JSON message: {}", e))?;

    message_handler
        .handle_message(client_message)
        .await
        .map_err(|e| format!("Message handling error: {}", e))?;

    Ok(())
}
