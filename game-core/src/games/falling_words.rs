//! Falling words: whole words drop through a shared field. Typing a word's
//! first character locks it to the player; finishing the word clears it.
//! Any word reaching the bottom ends the game for everyone, and clearing
//! the entire batch ends it in victory.

use rand::rngs::StdRng;
use rand::Rng;

use game_types::{
    FallingWord, GameSettings, GameSpecificState, GameState, GameStatus, PlayerGameData, PlayerId,
};

use crate::content;
use crate::engine::{GameLogic, KeyOutcome};
use crate::games::{FIELD_BOTTOM, FIELD_WIDTH};
use crate::scoring;

const TOTAL_WORDS: u32 = 30;
const FIRST_SPAWN_MS: u64 = 1_500;

pub fn create(settings: &GameSettings) -> (GameSpecificState, Box<dyn GameLogic>) {
    let spawn_interval_ms = 2_400u64
        .saturating_sub(250 * settings.difficulty.saturating_sub(1) as u64)
        .max(1_200);
    let word_speed = 8.0 + 1.5 * settings.difficulty.saturating_sub(1) as f32;
    (
        GameSpecificState::FallingWords {
            words: Vec::new(),
            next_word_id: 0,
            next_spawn_ms: FIRST_SPAWN_MS,
            spawned_count: 0,
            total_words: TOTAL_WORDS,
        },
        Box::new(FallingWordsLogic {
            spawn_interval_ms,
            word_speed,
        }),
    )
}

struct FallingWordsLogic {
    spawn_interval_ms: u64,
    word_speed: f32,
}

impl GameLogic for FallingWordsLogic {
    fn initial_player_data(&self) -> PlayerGameData {
        PlayerGameData::FallingWords {
            active_word_id: None,
            words_cleared: 0,
        }
    }

    fn handle_key(&mut self, state: &mut GameState, player_id: PlayerId, key: char) -> KeyOutcome {
        let level = state.players.get(&player_id).map(|p| p.level).unwrap_or(1);
        let GameState {
            players,
            game_specific,
            ..
        } = state;
        let GameSpecificState::FallingWords { words, .. } = game_specific else {
            return KeyOutcome::Miss;
        };
        let Some(p) = players.get_mut(&player_id) else {
            return KeyOutcome::Miss;
        };
        let PlayerGameData::FallingWords {
            active_word_id,
            words_cleared,
        } = &mut p.game_data
        else {
            return KeyOutcome::Miss;
        };

        // A stale lock (word already landed or cleared) falls back to
        // lock acquisition.
        let active = active_word_id.and_then(|id| {
            words
                .iter()
                .position(|w| w.id == id && w.locked_by == Some(player_id))
        });

        match active {
            Some(i) => {
                let word = &mut words[i];
                match word.text.as_bytes().get(word.typed as usize) {
                    Some(&expected) if expected as char == key => {
                        word.typed += 1;
                        if word.typed as usize >= word.text.len() {
                            let len = word.text.len();
                            words.remove(i);
                            *active_word_id = None;
                            *words_cleared += 1;
                            KeyOutcome::Hit {
                                points: scoring::word_points(len, level),
                            }
                        } else {
                            KeyOutcome::Hit { points: 1 }
                        }
                    }
                    _ => KeyOutcome::Miss,
                }
            }
            None => {
                *active_word_id = None;

                // Lock the lowest unclaimed word starting with this key.
                let mut target: Option<usize> = None;
                for (i, word) in words.iter().enumerate() {
                    if word.locked_by.is_some() || !word.text.starts_with(key) {
                        continue;
                    }
                    match target {
                        Some(best) if words[best].y >= word.y => {}
                        _ => target = Some(i),
                    }
                }
                let Some(i) = target else {
                    return KeyOutcome::Miss;
                };

                let word = &mut words[i];
                word.locked_by = Some(player_id);
                word.typed = 1;
                if word.typed as usize >= word.text.len() {
                    let len = word.text.len();
                    words.remove(i);
                    *words_cleared += 1;
                    KeyOutcome::Hit {
                        points: scoring::word_points(len, level),
                    }
                } else {
                    *active_word_id = Some(word.id);
                    KeyOutcome::Hit { points: 1 }
                }
            }
        }
    }

    fn tick(&mut self, state: &mut GameState, rng: &mut StdRng, dt_ms: u64) {
        let elapsed_ms = state.elapsed_ms;
        let GameState {
            status,
            game_specific,
            ..
        } = state;
        let GameSpecificState::FallingWords {
            words,
            next_word_id,
            next_spawn_ms,
            spawned_count,
            total_words,
        } = game_specific
        else {
            return;
        };

        while *spawned_count < *total_words && *next_spawn_ms <= elapsed_ms {
            words.push(FallingWord {
                id: *next_word_id,
                text: content::random_word(rng).to_string(),
                typed: 0,
                x: rng.gen_range(0.0..FIELD_WIDTH - 10.0),
                y: 0.0,
                speed: self.word_speed,
                locked_by: None,
            });
            *next_word_id += 1;
            *spawned_count += 1;
            *next_spawn_ms += self.spawn_interval_ms;
        }

        let dt = dt_ms as f32 / 1000.0;
        let mut landed = false;
        for word in words.iter_mut() {
            word.y += word.speed * dt;
            if word.y >= FIELD_BOTTOM {
                landed = true;
            }
        }

        // One word on the ground ends the round for the whole room; an
        // empty field after the full batch means the room beat the game.
        if landed || (*spawned_count >= *total_words && words.is_empty()) {
            *status = GameStatus::Finished;
        }
    }
}
