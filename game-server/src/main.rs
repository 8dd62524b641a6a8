use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use game_core::ranking::period_bounds;
use game_persistence::connection::connect_and_migrate;
use game_server::{
    config::Config, create_routes, identity::IdentityResolver, matchmaking::MatchInfo,
    matchmaking::MatchmakingQueue, recorder::SessionRecorder, room_registry::RoomRegistry,
    session_runtime::SessionManager, websocket::ConnectionManager,
    websocket::handlers::build_settings,
};
use game_types::{GameType, LeaderboardPeriod, ServerMessage};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting Typing Arena server...");

    let config = Config::new();
    let connections = Arc::new(ConnectionManager::new());
    let registry = Arc::new(RoomRegistry::new());
    let identity_resolver = Arc::new(IdentityResolver::new());
    let matchmaking = Arc::new(MatchmakingQueue::with_queue_timeout(Duration::from_secs(
        config.queue_timeout_seconds,
    )));

    // Initialize database connection and run migrations
    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };
    let recorder = Arc::new(SessionRecorder::new(db));

    let sessions = Arc::new(SessionManager::new(
        connections.clone(),
        registry.clone(),
        recorder.clone(),
        config.tick_interval_ms,
        config.rejoin_grace_seconds,
    ));

    let routes = create_routes(
        connections.clone(),
        registry.clone(),
        sessions.clone(),
        matchmaking.clone(),
        identity_resolver,
        recorder.clone(),
        config.countdown_seconds,
    );

    // Matchmaker: form matches and expire stale queue entries.
    {
        let matchmaking = matchmaking.clone();
        let connections = connections.clone();
        let registry = registry.clone();
        let sessions = sessions.clone();
        let interval_ms = config.matchmaker_interval_ms;
        let countdown_seconds = config.countdown_seconds;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                interval.tick().await;

                for timed_out in matchmaking.cleanup_expired_players().await {
                    let _ = connections
                        .send_to_player(timed_out, ServerMessage::MatchTimeout)
                        .await;
                }

                for matched in matchmaking.try_create_matches().await {
                    start_matched_game(
                        matched,
                        &connections,
                        &registry,
                        &sessions,
                        countdown_seconds,
                    )
                    .await;
                }
            }
        });
    }

    // Periodic cleanup of dead connections and stale rooms.
    {
        let connections = connections.clone();
        let registry = registry.clone();
        let connection_timeout = Duration::from_secs(config.connection_timeout_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                connections
                    .cleanup_inactive_connections(connection_timeout)
                    .await;
                let removed = registry.cleanup_stale_rooms().await;
                for room_id in removed {
                    connections
                        .broadcast_lobby(ServerMessage::RoomDeleted { room_id })
                        .await;
                }
            }
        });
    }

    // Leaderboard maintenance: cached rank refresh and expired-window purge.
    {
        let recorder = recorder.clone();
        let interval_secs = config.rank_update_interval_seconds;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                let now = chrono::Utc::now();
                for game_type in GameType::ALL {
                    for period in LeaderboardPeriod::ALL {
                        let (period_start, _) = period_bounds(period, now);
                        if let Err(e) = recorder
                            .leaderboard()
                            .update_ranks(game_type, period, period_start)
                            .await
                        {
                            warn!(
                                "Rank refresh failed for {}/{}: {}",
                                game_type.as_str(),
                                period.as_str(),
                                e
                            );
                        }
                    }
                }
                match recorder.leaderboard().clean_expired_periods(now).await {
                    Ok(removed) if removed > 0 => {
                        info!("Purged {} expired leaderboard entries", removed);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Expired leaderboard purge failed: {}", e),
                }
            }
        });
    }

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().unwrap(),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}

/// Turns a formed match into a room and launches its countdown. Players
/// who dropped between queueing and matching are skipped; if fewer than
/// two remain the match is abandoned and survivors are told to re-queue.
async fn start_matched_game(
    matched: MatchInfo,
    connections: &Arc<ConnectionManager>,
    registry: &Arc<RoomRegistry>,
    sessions: &Arc<SessionManager>,
    countdown_seconds: u32,
) {
    let mut present = Vec::new();
    for player_id in &matched.players {
        match connections.get_connection_by_player(*player_id).await {
            Some(conn) if conn.identity.is_some() => present.push(conn),
            _ => warn!("Matched player {} is no longer connected", player_id),
        }
    }
    if present.len() < 2 {
        for conn in &present {
            let _ = connections
                .send_to_connection(conn.id, ServerMessage::MatchTimeout)
                .await;
        }
        return;
    }

    let identities: Vec<_> = present
        .iter()
        .filter_map(|conn| conn.identity.clone())
        .collect();
    let host = &identities[0];
    let room_name = format!("Ranked {}", matched.game_type.as_str());

    let room = match registry
        .create_room(
            matched.game_type,
            &room_name,
            None,
            present.len() as u8,
            build_settings(None),
            host,
        )
        .await
    {
        Ok(room) => room,
        Err(e) => {
            warn!("Failed to create matched room: {}", e);
            return;
        }
    };
    let room_id = room.id;

    for identity in identities.iter().skip(1) {
        if let Err(e) = registry.join_room(room_id, identity, None).await {
            warn!(
                "Matched player {} could not join room {}: {}",
                identity.player_id, room_id, e
            );
            continue;
        }
        let _ = registry.set_ready(room_id, identity.player_id, true).await;
    }

    let Some(room) = registry.get_room(room_id).await else {
        return;
    };
    for conn in &present {
        connections.set_connection_room(conn.id, Some(room_id)).await;
        let _ = connections
            .send_to_connection(
                conn.id,
                ServerMessage::MatchFound {
                    room_id,
                    room: room.clone(),
                },
            )
            .await;
    }

    match registry.start_countdown(room_id, host.player_id).await {
        Ok(_) => {
            info!(
                "Matched game starting in room {} with {} players",
                room_id,
                room.players.len()
            );
            sessions.launch(room_id, countdown_seconds);
        }
        Err(e) => warn!("Matched room {} failed to start: {}", room_id, e),
    }
}
