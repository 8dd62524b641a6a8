//! Authoritative game engine. A `Game` is owned by exactly one session
//! task; it is driven by keystrokes from connected players and by a fixed
//! tick that advances time-based mechanics. All randomness flows through
//! the room-seeded RNG so two games with the same seed and inputs play out
//! identically.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

use game_types::{
    GameSpecificState, GameState, GameStatus, PlayerGameData, PlayerId, PlayerState, Room,
};

use crate::games;
use crate::scoring;

/// Result of feeding one keystroke into the game.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    Accepted,
    Rejected { reason: String },
}

/// What a keystroke did inside the active variant's rules.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Correct keystroke worth the given points.
    Hit { points: i64 },
    /// Counted keystroke that was wrong for this player right now.
    Miss,
}

/// The rules of one game variant. Implementations are stateless aside
/// from fixed configuration; all mutable game data lives in `GameState`
/// so snapshots carry everything a client needs to render.
pub trait GameLogic: Send {
    fn initial_player_data(&self) -> PlayerGameData;

    /// Applies one keystroke for a live, unfinished player. The engine has
    /// already validated the player; the logic only judges the key.
    fn handle_key(&mut self, state: &mut GameState, player_id: PlayerId, key: char) -> KeyOutcome;

    /// Advances time-based mechanics by `dt_ms`. May finish individual
    /// players or the whole game by mutating `state`.
    fn tick(&mut self, state: &mut GameState, rng: &mut StdRng, dt_ms: u64);
}

pub struct Game {
    pub state: GameState,
    logic: Box<dyn GameLogic>,
    rng: StdRng,
}

impl Game {
    /// Builds a fresh game for a room entering play. Content is generated
    /// up front from the room's seed; every member of the room gets a
    /// player slot, connected or not, so rejoin during play works.
    pub fn new(room: &Room, now: DateTime<Utc>) -> Game {
        let mut rng = StdRng::seed_from_u64(room.settings.seed);
        let (game_specific, logic) = games::create(room.game_type, &room.settings, &mut rng);

        let players: HashMap<PlayerId, PlayerState> = room
            .players
            .iter()
            .map(|p| {
                (
                    p.player_id,
                    PlayerState {
                        player_id: p.player_id,
                        player_type: p.player_type,
                        display_name: p.display_name.clone(),
                        score: 0,
                        level: 1,
                        lives: initial_lives(&game_specific),
                        keystrokes: 0,
                        correct_keystrokes: 0,
                        errors: 0,
                        wpm: 0.0,
                        accuracy: 100.0,
                        is_finished: false,
                        is_connected: p.is_connected,
                        finished_at_ms: None,
                        disconnected_at: None,
                        game_data: logic.initial_player_data(),
                    },
                )
            })
            .collect();

        Game {
            state: GameState {
                room_id: room.id,
                game_type: room.game_type,
                status: GameStatus::Playing,
                started_at: now.to_rfc3339(),
                started_at_ms: now.timestamp_millis() as u64,
                elapsed_ms: 0,
                settings: room.settings.clone(),
                players,
                game_specific,
            },
            logic,
            rng,
        }
    }

    /// Feeds one keystroke from a player. Input is rejected, never
    /// silently dropped, when the game or the player cannot accept it.
    /// A wrong key is rejected too, but still counts toward the player's
    /// keystroke, error and accuracy totals.
    pub fn handle_input(&mut self, player_id: PlayerId, key: char) -> InputOutcome {
        if self.state.status != GameStatus::Playing {
            return InputOutcome::Rejected {
                reason: "game is not in progress".to_string(),
            };
        }
        match self.state.players.get(&player_id) {
            None => {
                return InputOutcome::Rejected {
                    reason: "player is not part of this game".to_string(),
                }
            }
            Some(p) if p.is_finished => {
                return InputOutcome::Rejected {
                    reason: "player has already finished".to_string(),
                }
            }
            Some(_) => {}
        }

        let outcome = self.logic.handle_key(&mut self.state, player_id, key);
        let elapsed_ms = self.state.elapsed_ms;
        let mut result = InputOutcome::Accepted;
        if let Some(p) = self.state.players.get_mut(&player_id) {
            p.keystrokes += 1;
            match outcome {
                KeyOutcome::Hit { points } => {
                    p.correct_keystrokes += 1;
                    p.score += points;
                }
                KeyOutcome::Miss => {
                    p.errors += 1;
                    result = InputOutcome::Rejected {
                        reason: "wrong key".to_string(),
                    };
                }
            }
            refresh_metrics(p, elapsed_ms);
        }

        if self.state.all_finished() {
            self.state.status = GameStatus::Finished;
        }
        result
    }

    /// Advances the game clock by `dt_ms` and runs the variant's tick.
    /// Returns true once the game has terminated.
    pub fn tick(&mut self, dt_ms: u64) -> bool {
        if self.state.status != GameStatus::Playing {
            return self.state.status == GameStatus::Finished;
        }

        self.state.elapsed_ms += dt_ms;
        self.logic.tick(&mut self.state, &mut self.rng, dt_ms);

        let elapsed_ms = self.state.elapsed_ms;
        for p in self.state.players.values_mut() {
            refresh_metrics(p, elapsed_ms);
        }

        if self.state.elapsed_ms >= self.state.settings.time_limit_ms
            || self.state.all_finished()
        {
            self.state.status = GameStatus::Finished;
        }
        self.state.status == GameStatus::Finished
    }

    /// Marks a player connected or disconnected without removing them;
    /// their slot and progress survive for the rejoin grace window.
    pub fn set_connected(&mut self, player_id: PlayerId, connected: bool, now: DateTime<Utc>) {
        if let Some(p) = self.state.players.get_mut(&player_id) {
            p.is_connected = connected;
            p.disconnected_at = if connected {
                None
            } else {
                Some(now.to_rfc3339())
            };
        }
    }

    pub fn is_over(&self) -> bool {
        self.state.status == GameStatus::Finished
    }
}

fn initial_lives(game_specific: &GameSpecificState) -> Option<u32> {
    match game_specific {
        GameSpecificState::FallingBlocks { max_errors, .. } => Some(*max_errors),
        _ => None,
    }
}

fn refresh_metrics(p: &mut PlayerState, elapsed_ms: u64) {
    p.wpm = scoring::wpm(p.correct_keystrokes, elapsed_ms);
    p.accuracy = scoring::accuracy(p.correct_keystrokes, p.keystrokes);
    p.level = scoring::level_for_score(p.score);
}

/// Finishes a player at the current elapsed time. Shared by the variant
/// implementations.
pub(crate) fn finish_player(p: &mut PlayerState, elapsed_ms: u64) {
    if !p.is_finished {
        p.is_finished = true;
        p.finished_at_ms = Some(elapsed_ms);
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::test_room;
    use super::*;
    use game_types::GameType;

    #[test]
    fn test_new_game_seats_every_room_member() {
        let room = test_room(GameType::SpeedRace, 3);
        let game = Game::new(&room, Utc::now());
        assert_eq!(game.state.players.len(), 3);
        assert_eq!(game.state.status, GameStatus::Playing);
        for p in game.state.players.values() {
            assert_eq!(p.score, 0);
            assert!(!p.is_finished);
        }
    }

    #[test]
    fn test_input_rejected_for_unknown_player() {
        let room = test_room(GameType::SpeedRace, 2);
        let mut game = Game::new(&room, Utc::now());
        let outcome = game.handle_input(PlayerId::new_v4(), 'a');
        assert!(matches!(outcome, InputOutcome::Rejected { .. }));
    }

    #[test]
    fn test_input_rejected_after_game_over() {
        let room = test_room(GameType::SpeedRace, 2);
        let mut game = Game::new(&room, Utc::now());
        let player_id = room.players[0].player_id;
        game.state.status = GameStatus::Finished;
        let outcome = game.handle_input(player_id, 'a');
        assert!(matches!(outcome, InputOutcome::Rejected { .. }));
    }

    #[test]
    fn test_time_limit_ends_game() {
        let room = test_room(GameType::SpeedRace, 2);
        let mut game = Game::new(&room, Utc::now());
        let limit = game.state.settings.time_limit_ms;
        assert!(!game.tick(limit - 1));
        assert!(game.tick(1));
        assert_eq!(game.state.status, GameStatus::Finished);
    }

    #[test]
    fn test_disconnect_keeps_player_slot() {
        let room = test_room(GameType::SpeedRace, 2);
        let mut game = Game::new(&room, Utc::now());
        let player_id = room.players[1].player_id;
        game.set_connected(player_id, false, Utc::now());
        let p = game.state.player(player_id).unwrap();
        assert!(!p.is_connected);
        assert!(p.disconnected_at.is_some());
        game.set_connected(player_id, true, Utc::now());
        assert!(game.state.player(player_id).unwrap().disconnected_at.is_none());
    }

    #[test]
    fn test_wrong_key_rejected_but_counts_error() {
        let room = test_room(GameType::SpeedRace, 1);
        let mut game = Game::new(&room, Utc::now());
        let player_id = room.players[0].player_id;
        game.tick(1000);
        // The passage is lowercase text; '9' can never be correct.
        let outcome = game.handle_input(player_id, '9');
        assert!(matches!(outcome, InputOutcome::Rejected { .. }));
        let p = game.state.player(player_id).unwrap();
        assert_eq!(p.errors, 1);
        assert_eq!(p.keystrokes, 1);
        assert!(p.accuracy < 100.0);
    }

    #[test]
    fn test_disconnected_player_does_not_hold_game_open() {
        let room = test_room(GameType::SpeedRace, 2);
        let mut game = Game::new(&room, Utc::now());
        let typist = room.players[0].player_id;
        let ghost = room.players[1].player_id;
        game.set_connected(ghost, false, Utc::now());

        let GameSpecificState::SpeedRace { passage } = game.state.game_specific.clone() else {
            panic!("wrong variant");
        };
        game.tick(100);
        for ch in passage.chars() {
            assert_eq!(game.handle_input(typist, ch), InputOutcome::Accepted);
        }

        // The last connected player finishing ends the game; the ghost
        // seat stays unfinished with its last-known state.
        assert!(game.is_over());
        assert!(game.state.player(typist).unwrap().is_finished);
        assert!(!game.state.player(ghost).unwrap().is_finished);
    }
}
