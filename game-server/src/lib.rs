use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use warp::Filter;
use warp::http::StatusCode;

use crate::identity::IdentityResolver;
use crate::matchmaking::MatchmakingQueue;
use crate::recorder::SessionRecorder;
use crate::room_registry::RoomRegistry;
use crate::session_runtime::SessionManager;
use crate::websocket::ConnectionManager;
use game_core::ranking::period_bounds;
use game_types::{GameType, LeaderboardPeriod};

pub mod config;
pub mod identity;
pub mod matchmaking;
pub mod recorder;
pub mod room_registry;
pub mod session_runtime;
pub mod websocket;

#[derive(Deserialize)]
struct LeaderboardQuery {
    period: Option<String>,
    limit: Option<u64>,
}

#[derive(Deserialize)]
struct FriendsQuery {
    period: Option<String>,
    /// Comma-separated player ids.
    ids: String,
}

pub fn create_routes(
    connections: Arc<ConnectionManager>,
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionManager>,
    matchmaking: Arc<MatchmakingQueue>,
    identity_resolver: Arc<IdentityResolver>,
    recorder: Arc<SessionRecorder>,
    countdown_seconds: u32,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let connections_filter = warp::any().map({
        let connections = connections.clone();
        move || connections.clone()
    });

    let registry_filter = warp::any().map({
        let registry = registry.clone();
        move || registry.clone()
    });

    let sessions_filter = warp::any().map({
        let sessions = sessions.clone();
        move || sessions.clone()
    });

    let matchmaking_filter = warp::any().map({
        let matchmaking = matchmaking.clone();
        move || matchmaking.clone()
    });

    let identity_filter = warp::any().map({
        let identity_resolver = identity_resolver.clone();
        move || identity_resolver.clone()
    });

    let recorder_filter = warp::any().map({
        let recorder = recorder.clone();
        move || recorder.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connections_filter.clone())
        .and(registry_filter.clone())
        .and(sessions_filter.clone())
        .and(matchmaking_filter.clone())
        .and(identity_filter.clone())
        .map(
            move |ws: warp::ws::Ws, conns, registry, sessions, queue, resolver| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(
                        socket,
                        conns,
                        registry,
                        sessions,
                        queue,
                        resolver,
                        countdown_seconds,
                    )
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    // Top scores for one game type and period
    let leaderboard = warp::path!("leaderboard" / String)
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(recorder_filter.clone())
        .and_then(handle_leaderboard_request);

    // One player's rank within a leaderboard scope
    let player_rank = warp::path!("leaderboard" / String / "rank" / Uuid)
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(recorder_filter.clone())
        .and_then(handle_player_rank_request);

    // Leaderboard restricted to a friend list
    let friends = warp::path!("leaderboard" / String / "friends")
        .and(warp::get())
        .and(warp::query::<FriendsQuery>())
        .and(recorder_filter.clone())
        .and_then(handle_friends_request);

    // Finished session lookup
    let session = warp::path!("session" / Uuid)
        .and(warp::get())
        .and(recorder_filter.clone())
        .and_then(handle_session_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    websocket
        .or(health)
        .or(player_rank)
        .or(friends)
        .or(leaderboard)
        .or(session)
        .with(cors)
        .with(warp::log("typing_arena"))
}

fn json_error(message: &str, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    )
}

fn parse_scope(
    game_type: &str,
    period: Option<&str>,
) -> Result<(GameType, LeaderboardPeriod), warp::reply::WithStatus<warp::reply::Json>> {
    let game_type = GameType::from_str(game_type)
        .ok_or_else(|| json_error("Unknown game type", StatusCode::BAD_REQUEST))?;
    let period = match period {
        None => LeaderboardPeriod::AllTime,
        Some(raw) => LeaderboardPeriod::from_str(raw)
            .ok_or_else(|| json_error("Unknown period", StatusCode::BAD_REQUEST))?,
    };
    Ok((game_type, period))
}

async fn handle_leaderboard_request(
    game_type: String,
    query: LeaderboardQuery,
    recorder: Arc<SessionRecorder>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (game_type, period) = match parse_scope(&game_type, query.period.as_deref()) {
        Ok(scope) => scope,
        Err(reply) => return Ok(reply),
    };
    let limit = query.limit.unwrap_or(10).min(100);
    let (period_start, _) = period_bounds(period, Utc::now());

    match recorder
        .leaderboard()
        .get_top_players(game_type, period, period_start, limit)
        .await
    {
        Ok(entries) => Ok(warp::reply::with_status(
            warp::reply::json(&entries),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch leaderboard: {}", err);
            Ok(json_error(
                "Failed to fetch leaderboard",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_player_rank_request(
    game_type: String,
    player_id: Uuid,
    query: LeaderboardQuery,
    recorder: Arc<SessionRecorder>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (game_type, period) = match parse_scope(&game_type, query.period.as_deref()) {
        Ok(scope) => scope,
        Err(reply) => return Ok(reply),
    };
    let (period_start, _) = period_bounds(period, Utc::now());

    match recorder
        .leaderboard()
        .get_player_rank(game_type, period, period_start, player_id)
        .await
    {
        Ok(Some(rank)) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({ "player_id": player_id, "rank": rank })),
            StatusCode::OK,
        )),
        Ok(None) => Ok(json_error(
            "Player has no entry in this leaderboard",
            StatusCode::NOT_FOUND,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch player rank: {}", err);
            Ok(json_error(
                "Failed to fetch player rank",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_friends_request(
    game_type: String,
    query: FriendsQuery,
    recorder: Arc<SessionRecorder>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (game_type, period) = match parse_scope(&game_type, query.period.as_deref()) {
        Ok(scope) => scope,
        Err(reply) => return Ok(reply),
    };

    let friend_ids: Result<Vec<Uuid>, _> = query
        .ids
        .split(',')
        .filter(|s| !s.is_empty())
        .map(Uuid::parse_str)
        .collect();
    let friend_ids = match friend_ids {
        Ok(ids) => ids,
        Err(_) => return Ok(json_error("Invalid friend id", StatusCode::BAD_REQUEST)),
    };

    let (period_start, _) = period_bounds(period, Utc::now());
    match recorder
        .leaderboard()
        .get_friends_leaderboard(game_type, period, period_start, &friend_ids)
        .await
    {
        Ok(entries) => Ok(warp::reply::with_status(
            warp::reply::json(&entries),
            StatusCode::OK,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch friends leaderboard: {}", err);
            Ok(json_error(
                "Failed to fetch friends leaderboard",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_session_request(
    session_id: Uuid,
    recorder: Arc<SessionRecorder>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match recorder.sessions().find_by_id(session_id).await {
        Ok(Some(session)) => Ok(warp::reply::with_status(
            warp::reply::json(&session),
            StatusCode::OK,
        )),
        Ok(None) => Ok(json_error("Session not found", StatusCode::NOT_FOUND)),
        Err(err) => {
            tracing::error!("Failed to fetch session: {}", err);
            Ok(json_error(
                "Failed to fetch session",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
