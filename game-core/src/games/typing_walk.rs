//! Typing walk: every player walks the same word course, one correct
//! character per step. Purely input-driven; there is no timer pressure
//! beyond the room's overall time limit.

use rand::rngs::StdRng;

use game_types::{GameSettings, GameSpecificState, GameState, PlayerGameData, PlayerId};

use crate::content;
use crate::engine::{finish_player, GameLogic, KeyOutcome};
use crate::scoring;

const MIN_COURSE_LEN: usize = 300;

pub fn create(settings: &GameSettings, rng: &mut StdRng) -> (GameSpecificState, Box<dyn GameLogic>) {
    // Longer course on higher difficulty.
    let target_len = MIN_COURSE_LEN + 100 * settings.difficulty.saturating_sub(1) as usize;
    let mut course = String::new();
    while course.len() < target_len {
        if !course.is_empty() {
            course.push(' ');
        }
        course.push_str(content::random_word(rng));
    }
    (
        GameSpecificState::TypingWalk { course },
        Box::new(TypingWalkLogic),
    )
}

struct TypingWalkLogic;

impl GameLogic for TypingWalkLogic {
    fn initial_player_data(&self) -> PlayerGameData {
        PlayerGameData::TypingWalk { steps: 0 }
    }

    fn handle_key(&mut self, state: &mut GameState, player_id: PlayerId, key: char) -> KeyOutcome {
        let elapsed_ms = state.elapsed_ms;
        let GameSpecificState::TypingWalk { course } = &state.game_specific else {
            return KeyOutcome::Miss;
        };
        let course_len = course.len();

        let Some(p) = state.players.get_mut(&player_id) else {
            return KeyOutcome::Miss;
        };
        let PlayerGameData::TypingWalk { steps } = &mut p.game_data else {
            return KeyOutcome::Miss;
        };

        // The course is plain ASCII, so byte indexing is character indexing.
        match course.as_bytes().get(*steps as usize) {
            Some(&expected) if expected as char == key => {
                *steps += 1;
                let walked = *steps;
                let points = scoring::walk_step_points(walked / 10);
                if walked as usize >= course_len {
                    finish_player(p, elapsed_ms);
                }
                KeyOutcome::Hit { points }
            }
            _ => KeyOutcome::Miss,
        }
    }

    fn tick(&mut self, _state: &mut GameState, _rng: &mut StdRng, _dt_ms: u64) {}
}
