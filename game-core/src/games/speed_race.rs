//! Speed race: everyone types the same passage; position through the
//! passage is the race track. Finishing early converts the unused time
//! into bonus points.

use rand::rngs::StdRng;

use game_types::{GameSettings, GameSpecificState, GameState, PlayerGameData, PlayerId};

use crate::content;
use crate::engine::{finish_player, GameLogic, KeyOutcome};
use crate::scoring;

const POINTS_PER_CHAR: i64 = 2;

pub fn create(_settings: &GameSettings, rng: &mut StdRng) -> (GameSpecificState, Box<dyn GameLogic>) {
    (
        GameSpecificState::SpeedRace {
            passage: content::random_passage(rng).to_string(),
        },
        Box::new(SpeedRaceLogic),
    )
}

struct SpeedRaceLogic;

impl GameLogic for SpeedRaceLogic {
    fn initial_player_data(&self) -> PlayerGameData {
        PlayerGameData::SpeedRace { position: 0 }
    }

    fn handle_key(&mut self, state: &mut GameState, player_id: PlayerId, key: char) -> KeyOutcome {
        let elapsed_ms = state.elapsed_ms;
        let time_limit_ms = state.settings.time_limit_ms;
        let GameSpecificState::SpeedRace { passage } = &state.game_specific else {
            return KeyOutcome::Miss;
        };
        let passage_len = passage.len();

        let Some(p) = state.players.get_mut(&player_id) else {
            return KeyOutcome::Miss;
        };
        let PlayerGameData::SpeedRace { position } = &mut p.game_data else {
            return KeyOutcome::Miss;
        };

        match passage.as_bytes().get(*position as usize) {
            Some(&expected) if expected as char == key => {
                *position += 1;
                let mut points = POINTS_PER_CHAR;
                if *position as usize >= passage_len {
                    points += scoring::race_completion_bonus(elapsed_ms, time_limit_ms);
                    finish_player(p, elapsed_ms);
                }
                KeyOutcome::Hit { points }
            }
            _ => KeyOutcome::Miss,
        }
    }

    fn tick(&mut self, _state: &mut GameState, _rng: &mut StdRng, _dt_ms: u64) {}
}
