use chrono::Utc;
use game_core::{Game, LobbyRoom};
use game_types::{
    GameSettings, GameSpecificState, GameType, PlayerId, PlayerIdentity, PlayerType, Room,
};
use uuid::Uuid;

/// Creates a test identity with a fresh player id
pub fn create_test_identity(name: &str) -> PlayerIdentity {
    PlayerIdentity {
        player_id: Uuid::new_v4(),
        player_type: PlayerType::Guest,
        display_name: name.to_string(),
    }
}

/// Creates a waiting room with the given number of members, host first
pub fn create_test_room(game_type: GameType, player_count: usize) -> (LobbyRoom, Vec<PlayerId>) {
    let host = create_test_identity("Alice");
    let mut ids = vec![host.player_id];
    let mut room = LobbyRoom::create(
        game_type,
        "test room",
        None,
        8,
        GameSettings::with_seed(42),
        &host,
        Utc::now(),
    )
    .expect("room creation");

    for i in 1..player_count {
        let member = create_test_identity(&format!("Player{}", i + 1));
        room.join(&member, None, Utc::now()).expect("join");
        room.set_ready(member.player_id, true).expect("ready");
        ids.push(member.player_id);
    }
    (room, ids)
}

/// Drives a room through its lobby transitions and starts the game
pub fn start_test_game(game_type: GameType, player_count: usize) -> (Game, Room, Vec<PlayerId>) {
    let (mut room, ids) = create_test_room(game_type, player_count);
    room.check_start(ids[0]).expect("start preconditions");
    room.begin_countdown();
    room.begin_playing(Utc::now());
    let snapshot = room.snapshot();
    (Game::new(&snapshot, Utc::now()), snapshot, ids)
}

/// Feeds a string of keystrokes from one player
pub fn type_text(game: &mut Game, player_id: PlayerId, text: &str) {
    for ch in text.chars() {
        game.handle_input(player_id, ch);
    }
}

/// Extracts the shared passage of a speed-race game
pub fn race_passage(game: &Game) -> String {
    match &game.state.game_specific {
        GameSpecificState::SpeedRace { passage } => passage.clone(),
        other => panic!("expected a speed race, got {:?}", other),
    }
}
