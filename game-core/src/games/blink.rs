//! Blink: every player works through the same character sequence, one
//! character at a time under a reaction deadline. Fast answers and streaks
//! score higher; a missed deadline advances the character and costs an
//! error.

use rand::rngs::StdRng;

use game_types::{GameSettings, GameSpecificState, GameState, PlayerGameData, PlayerId};

use crate::content;
use crate::engine::{finish_player, GameLogic, KeyOutcome};
use crate::scoring;

const SEQUENCE_LEN: u32 = 40;
const BASE_CHAR_LIMIT_MS: u64 = 2_500;

pub fn create(settings: &GameSettings, rng: &mut StdRng) -> (GameSpecificState, Box<dyn GameLogic>) {
    let char_time_limit_ms = BASE_CHAR_LIMIT_MS
        .saturating_sub(300 * settings.difficulty.saturating_sub(1) as u64)
        .max(1_000);
    (
        GameSpecificState::Blink {
            sequence: content::char_sequence(rng, SEQUENCE_LEN as usize),
            char_time_limit_ms,
            total_chars: SEQUENCE_LEN,
        },
        Box::new(BlinkLogic),
    )
}

struct BlinkLogic;

impl GameLogic for BlinkLogic {
    fn initial_player_data(&self) -> PlayerGameData {
        PlayerGameData::Blink {
            index: 0,
            shown_at_ms: 0,
            response_time_total_ms: 0,
            streak: 0,
            best_streak: 0,
            first_answer_count: 0,
        }
    }

    fn handle_key(&mut self, state: &mut GameState, player_id: PlayerId, key: char) -> KeyOutcome {
        let elapsed_ms = state.elapsed_ms;
        let (current_index, shown_at_ms, streak_before) = match state
            .players
            .get(&player_id)
            .map(|p| &p.game_data)
        {
            Some(PlayerGameData::Blink {
                index,
                shown_at_ms,
                streak,
                ..
            }) => (*index, *shown_at_ms, *streak),
            _ => return KeyOutcome::Miss,
        };

        let (expected, char_time_limit_ms, total_chars) = match &state.game_specific {
            GameSpecificState::Blink {
                sequence,
                char_time_limit_ms,
                total_chars,
            } => (
                sequence.chars().nth(current_index as usize),
                *char_time_limit_ms,
                *total_chars,
            ),
            _ => return KeyOutcome::Miss,
        };
        let Some(expected) = expected else {
            return KeyOutcome::Miss;
        };

        if key != expected {
            // Wrong answer breaks the streak but never advances the character.
            if let Some(p) = state.players.get_mut(&player_id) {
                if let PlayerGameData::Blink { streak, .. } = &mut p.game_data {
                    *streak = 0;
                }
            }
            return KeyOutcome::Miss;
        }

        let response_ms = elapsed_ms.saturating_sub(shown_at_ms);
        let points = scoring::blink_points(response_ms, char_time_limit_ms, streak_before);

        // Leading the pack earns the first-answer tally used in stats.
        let max_other_index = state
            .players
            .values()
            .filter(|p| p.player_id != player_id)
            .filter_map(|p| match p.game_data {
                PlayerGameData::Blink { index, .. } => Some(index),
                _ => None,
            })
            .max();

        let Some(p) = state.players.get_mut(&player_id) else {
            return KeyOutcome::Miss;
        };
        let mut done = false;
        if let PlayerGameData::Blink {
            index,
            shown_at_ms,
            response_time_total_ms,
            streak,
            best_streak,
            first_answer_count,
        } = &mut p.game_data
        {
            *index += 1;
            *shown_at_ms = elapsed_ms;
            *response_time_total_ms += response_ms;
            *streak += 1;
            *best_streak = (*best_streak).max(*streak);
            if max_other_index.is_some_and(|m| *index > m) {
                *first_answer_count += 1;
            }
            done = *index >= total_chars;
        }
        if done {
            finish_player(p, elapsed_ms);
        }

        KeyOutcome::Hit { points }
    }

    fn tick(&mut self, state: &mut GameState, _rng: &mut StdRng, _dt_ms: u64) {
        let elapsed_ms = state.elapsed_ms;
        let (char_time_limit_ms, total_chars) = match &state.game_specific {
            GameSpecificState::Blink {
                char_time_limit_ms,
                total_chars,
                ..
            } => (*char_time_limit_ms, *total_chars),
            _ => return,
        };

        for p in state.players.values_mut() {
            if p.is_finished {
                continue;
            }
            let mut timed_out = false;
            let mut done = false;
            if let PlayerGameData::Blink {
                index,
                shown_at_ms,
                streak,
                ..
            } = &mut p.game_data
            {
                if elapsed_ms.saturating_sub(*shown_at_ms) >= char_time_limit_ms {
                    *index += 1;
                    *shown_at_ms = elapsed_ms;
                    *streak = 0;
                    timed_out = true;
                    done = *index >= total_chars;
                }
            }
            if timed_out {
                p.errors += 1;
            }
            if done {
                finish_player(p, elapsed_ms);
            }
        }
    }
}
