
use std::time::Duration;

use game_core::ranking::period_bounds;
use game_types::{
    GameSettings, GameSpecificState, GameType, LeaderboardPeriod, RoomStatus, ServerMessage,
};
use test_helpers::{TestServerSetup, expect_message, wait_until};

fn short_settings(seed: u64) -> GameSettings {
    let mut settings = GameSettings::with_seed(seed);
    settings.time_limit_ms = 2_000;
    settings
}

#[tokio::test]
async fn test_multiplayer_race_end_to_end() {
    let setup = TestServerSetup::new().await;
    let (host_conn, host, mut host_rx) = setup.connect_player("Alice").await;
    let (guest_conn, guest, _guest_rx) = setup.connect_player("Bob").await;

    let room = setup
        .registry
        .create_room(
            GameType::SpeedRace,
            "race night",
            None,
            4,
            short_settings(42),
            &host,
        )
        .await
        .unwrap();
    setup.seat(host_conn, room.id).await;

    setup
        .registry
        .join_room(room.id, &guest, None)
        .await
        .unwrap();
    setup.seat(guest_conn, room.id).await;
    setup
        .registry
        .set_ready(room.id, guest.player_id, true)
        .await
        .unwrap();

    setup
        .registry
        .start_countdown(room.id, host.player_id)
        .await
        .unwrap();
    setup.sessions.launch(room.id, 0);

    let sessions = setup.sessions.clone();
    let room_id = room.id;
    assert!(
        wait_until(Duration::from_secs(2), || {
            let sessions = sessions.clone();
            async move { sessions.is_running(room_id).await }
        })
        .await,
        "session should start"
    );

    // Only the host types; the guest idles until the clock runs out.
    let state = setup.sessions.state_snapshot(room.id).await.unwrap();
    let GameSpecificState::SpeedRace { passage } = &state.game_specific else {
        panic!("expected a speed race");
    };
    for key in passage.clone().chars() {
        setup
            .sessions
            .input(room.id, host.player_id, key)
            .await
            .unwrap();
    }

    let ended = expect_message(&mut host_rx, Duration::from_secs(5), |m| {
        matches!(m, ServerMessage::GameEnded { .. })
    })
    .await;
    let Some(ServerMessage::GameEnded { session }) = ended else {
        panic!("expected GameEnded");
    };

    assert_eq!(session.winner, Some(host.player_id));
    assert_eq!(session.players.len(), 2);
    assert_eq!(session.players[0].player_id, host.player_id);
    assert_eq!(session.players[0].rank, 1);
    assert_eq!(session.players[1].rank, 2);

    // The finished game is queryable and fed the leaderboard.
    let stored = setup
        .recorder
        .sessions()
        .find_by_id(session.id)
        .await
        .unwrap();
    assert!(stored.is_some());

    let (start, _) = period_bounds(LeaderboardPeriod::AllTime, chrono::Utc::now());
    let top = setup
        .recorder
        .leaderboard()
        .get_top_players(GameType::SpeedRace, LeaderboardPeriod::AllTime, start, 10)
        .await
        .unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].player_id, host.player_id);
}

#[tokio::test]
async fn test_disconnect_and_rejoin_preserves_progress() {
    let setup = TestServerSetup::new().await;
    let (host_conn, host, _host_rx) = setup.connect_player("Solo").await;

    let room = setup
        .registry
        .create_room(
            GameType::TypingWalk,
            "walkabout",
            None,
            1,
            GameSettings::with_seed(7),
            &host,
        )
        .await
        .unwrap();
    setup.seat(host_conn, room.id).await;

    setup
        .registry
        .start_countdown(room.id, host.player_id)
        .await
        .unwrap();
    setup.sessions.launch(room.id, 0);

    let sessions = setup.sessions.clone();
    let room_id = room.id;
    assert!(
        wait_until(Duration::from_secs(2), || {
            let sessions = sessions.clone();
            async move { sessions.is_running(room_id).await }
        })
        .await
    );

    // Type the first few course characters to build up a score.
    let state = setup.sessions.state_snapshot(room.id).await.unwrap();
    let GameSpecificState::TypingWalk { course } = &state.game_specific else {
        panic!("expected a typing walk");
    };
    for key in course.chars().take(10).collect::<Vec<_>>() {
        setup
            .sessions
            .input(room.id, host.player_id, key)
            .await
            .unwrap();
    }

    setup
        .sessions
        .set_connected(room.id, host.player_id, false)
        .await
        .unwrap();
    setup
        .sessions
        .set_connected(room.id, host.player_id, true)
        .await
        .unwrap();

    let snapshot = setup.sessions.state_snapshot(room.id).await.unwrap();
    let player = &snapshot.players[&host.player_id];
    assert!(player.is_connected);
    assert_eq!(player.correct_keystrokes, 10);
    assert!(player.score > 0);
}

#[tokio::test]
async fn test_room_lifecycle_with_host_handover() {
    let setup = TestServerSetup::new().await;
    let (_host_conn, host, _host_rx) = setup.connect_player("Alice").await;
    let (_guest_conn, guest, _guest_rx) = setup.connect_player("Bob").await;

    let room = setup
        .registry
        .create_room(
            GameType::Blink,
            "blink lobby",
            None,
            4,
            GameSettings::with_seed(3),
            &host,
        )
        .await
        .unwrap();
    setup
        .registry
        .join_room(room.id, &guest, None)
        .await
        .unwrap();

    let (outcome, snapshot) = setup
        .registry
        .leave_room(room.id, host.player_id)
        .await
        .unwrap();
    assert_eq!(outcome.new_host, Some(guest.player_id));
    let snapshot = snapshot.unwrap();
    assert!(snapshot.host().unwrap().player_id == guest.player_id);

    let (outcome, _) = setup
        .registry
        .leave_room(room.id, guest.player_id)
        .await
        .unwrap();
    assert!(outcome.now_empty);
    assert!(setup.registry.get_room(room.id).await.is_none());
}

#[tokio::test]
async fn test_matched_players_share_one_room() {
    let setup = TestServerSetup::new().await;
    let (_c1, p1, _r1) = setup.connect_player("Racer1").await;
    let (_c2, p2, _r2) = setup.connect_player("Racer2").await;

    setup
        .matchmaking
        .add_player(p1.player_id, GameType::SpeedRace, 2)
        .await
        .unwrap();
    setup
        .matchmaking
        .add_player(p2.player_id, GameType::SpeedRace, 2)
        .await
        .unwrap();

    let matches = setup.matchmaking.try_create_matches().await;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].game_type, GameType::SpeedRace);
    assert_eq!(matches[0].players, vec![p1.player_id, p2.player_id]);
    assert_eq!(setup.matchmaking.total_queued().await, 0);
}

#[tokio::test]
async fn test_abandoned_game_finishes_and_room_is_cleaned() {
    let setup = TestServerSetup::new().await;
    let (host_conn, host, _host_rx) = setup.connect_player("Ghost").await;

    let room = setup
        .registry
        .create_room(
            GameType::FallingWords,
            "ghost town",
            None,
            1,
            GameSettings::with_seed(11),
            &host,
        )
        .await
        .unwrap();
    setup.seat(host_conn, room.id).await;

    setup
        .registry
        .start_countdown(room.id, host.player_id)
        .await
        .unwrap();
    setup.sessions.launch(room.id, 0);

    let sessions = setup.sessions.clone();
    let room_id = room.id;
    assert!(
        wait_until(Duration::from_secs(2), || {
            let sessions = sessions.clone();
            async move { sessions.is_running(room_id).await }
        })
        .await
    );

    setup
        .sessions
        .set_connected(room.id, host.player_id, false)
        .await
        .unwrap();

    // Grace period in the test setup is one second.
    let sessions = setup.sessions.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            let sessions = sessions.clone();
            async move { !sessions.is_running(room_id).await }
        })
        .await,
        "abandoned session should end after the grace window"
    );

    assert_eq!(
        setup.registry.get_room(room.id).await.unwrap().status,
        RoomStatus::Finished
    );
    let removed = setup.registry.cleanup_stale_rooms().await;
    assert!(removed.contains(&room.id));
}
