//! Falling blocks: single characters drop down each player's column group.
//! Typing a character clears that player's lowest matching block; a block
//! reaching the bottom costs its owner an error, and too many errors knock
//! the player out.

use rand::rngs::StdRng;
use rand::Rng;

use game_types::{
    FallingBlock, GameSettings, GameSpecificState, GameState, PlayerGameData, PlayerId,
};

use crate::content;
use crate::engine::{finish_player, GameLogic, KeyOutcome};
use crate::games::{FIELD_BOTTOM, FIELD_WIDTH};
use crate::scoring;

const FIRST_SPAWN_MS: u64 = 1_000;

pub fn create(settings: &GameSettings) -> (GameSpecificState, Box<dyn GameLogic>) {
    // Higher difficulty leaves less room for mistakes.
    let max_errors = 12u32.saturating_sub(2 * settings.difficulty.saturating_sub(1) as u32).max(4);
    (
        GameSpecificState::FallingBlocks {
            blocks: Vec::new(),
            next_block_id: 0,
            max_errors,
        },
        Box::new(FallingBlocksLogic { max_errors }),
    )
}

struct FallingBlocksLogic {
    max_errors: u32,
}

impl GameLogic for FallingBlocksLogic {
    fn initial_player_data(&self) -> PlayerGameData {
        PlayerGameData::FallingBlocks {
            error_count: 0,
            max_errors: self.max_errors,
            next_spawn_ms: FIRST_SPAWN_MS,
        }
    }

    fn handle_key(&mut self, state: &mut GameState, player_id: PlayerId, key: char) -> KeyOutcome {
        let level = state.players.get(&player_id).map(|p| p.level).unwrap_or(1);
        let GameSpecificState::FallingBlocks { blocks, .. } = &mut state.game_specific else {
            return KeyOutcome::Miss;
        };

        // The player's lowest matching block is the one about to land.
        let mut target: Option<usize> = None;
        for (i, block) in blocks.iter().enumerate() {
            if block.player_id != player_id || block.ch != key {
                continue;
            }
            match target {
                Some(best) if blocks[best].y >= block.y => {}
                _ => target = Some(i),
            }
        }

        match target {
            Some(i) => {
                blocks.remove(i);
                KeyOutcome::Hit {
                    points: scoring::block_points(level),
                }
            }
            None => KeyOutcome::Miss,
        }
    }

    fn tick(&mut self, state: &mut GameState, rng: &mut StdRng, dt_ms: u64) {
        let elapsed_ms = state.elapsed_ms;
        let GameState {
            players,
            game_specific,
            ..
        } = state;
        let GameSpecificState::FallingBlocks {
            blocks,
            next_block_id,
            ..
        } = game_specific
        else {
            return;
        };

        // Each player spawns on their own level-dependent cadence.
        for p in players.values_mut() {
            if p.is_finished || !p.is_connected {
                continue;
            }
            let PlayerGameData::FallingBlocks { next_spawn_ms, .. } = &mut p.game_data else {
                continue;
            };
            while *next_spawn_ms <= elapsed_ms {
                blocks.push(FallingBlock {
                    id: *next_block_id,
                    ch: content::random_char(rng),
                    x: rng.gen_range(0.0..FIELD_WIDTH - 5.0),
                    y: 0.0,
                    speed: scoring::fall_speed(p.level),
                    player_id: p.player_id,
                });
                *next_block_id += 1;
                *next_spawn_ms += scoring::spawn_interval_ms(p.level);
            }
        }

        let dt = dt_ms as f32 / 1000.0;
        let mut landed: Vec<PlayerId> = Vec::new();
        blocks.retain_mut(|block| {
            block.y += block.speed * dt;
            if block.y >= FIELD_BOTTOM {
                landed.push(block.player_id);
                false
            } else {
                true
            }
        });

        for player_id in landed {
            let Some(p) = players.get_mut(&player_id) else {
                continue;
            };
            if p.is_finished {
                continue;
            }
            p.errors += 1;
            let counts =
                if let PlayerGameData::FallingBlocks {
                    error_count,
                    max_errors,
                    ..
                } = &mut p.game_data
                {
                    *error_count += 1;
                    Some((*error_count, *max_errors))
                } else {
                    None
                };
            if let Some((error_count, max_errors)) = counts {
                p.lives = Some(max_errors.saturating_sub(error_count));
                if error_count >= max_errors {
                    finish_player(p, elapsed_ms);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::test_room;
    use crate::engine::{Game, InputOutcome};
    use chrono::Utc;
    use game_types::GameType;

    fn block_game(players: usize) -> Game {
        Game::new(&test_room(GameType::FallingBlocks, players), Utc::now())
    }

    fn blocks_of(game: &Game) -> &Vec<FallingBlock> {
        match &game.state.game_specific {
            GameSpecificState::FallingBlocks { blocks, .. } => blocks,
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_blocks_spawn_per_player() {
        let mut game = block_game(2);
        game.tick(FIRST_SPAWN_MS + 100);
        let blocks = blocks_of(&game);
        assert!(!blocks.is_empty());
        for player_id in game.state.players.keys() {
            assert!(blocks.iter().any(|b| b.player_id == *player_id));
        }
    }

    #[test]
    fn test_typing_clears_own_lowest_matching_block() {
        let mut game = block_game(2);
        let ids: Vec<PlayerId> = game.state.players.keys().copied().collect();
        let (typist, other) = (ids[0], ids[1]);

        if let GameSpecificState::FallingBlocks { blocks, .. } = &mut game.state.game_specific {
            blocks.push(FallingBlock {
                id: 0,
                ch: 'a',
                x: 10.0,
                y: 20.0,
                speed: 40.0,
                player_id: typist,
            });
            blocks.push(FallingBlock {
                id: 1,
                ch: 'a',
                x: 10.0,
                y: 80.0,
                speed: 40.0,
                player_id: typist,
            });
            blocks.push(FallingBlock {
                id: 2,
                ch: 'a',
                x: 10.0,
                y: 90.0,
                speed: 40.0,
                player_id: other,
            });
        }

        assert_eq!(game.handle_input(typist, 'a'), InputOutcome::Accepted);
        let blocks = blocks_of(&game);
        // The typist's lowest 'a' (id 1) is gone; the other player's block
        // is untouched even though it sits lower.
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().any(|b| b.id == 0));
        assert!(blocks.iter().any(|b| b.id == 2));
        let p = game.state.player(typist).unwrap();
        assert!(p.score > 0);
        assert_eq!(p.correct_keystrokes, 1);
    }

    #[test]
    fn test_no_matching_block_is_a_rejected_error() {
        let mut game = block_game(1);
        let typist = *game.state.players.keys().next().unwrap();
        assert!(matches!(
            game.handle_input(typist, 'z'),
            InputOutcome::Rejected { .. }
        ));
        assert_eq!(game.state.player(typist).unwrap().errors, 1);
    }

    #[test]
    fn test_landed_block_costs_error_and_knocks_out() {
        let mut game = block_game(1);
        let typist = *game.state.players.keys().next().unwrap();
        let max_errors = match &game.state.game_specific {
            GameSpecificState::FallingBlocks { max_errors, .. } => *max_errors,
            _ => unreachable!(),
        };

        for _ in 0..max_errors {
            if let GameSpecificState::FallingBlocks { blocks, next_block_id, .. } =
                &mut game.state.game_specific
            {
                blocks.push(FallingBlock {
                    id: *next_block_id,
                    ch: 'q',
                    x: 10.0,
                    y: FIELD_BOTTOM - 0.1,
                    speed: 100.0,
                    player_id: typist,
                });
                *next_block_id += 1;
            }
            game.tick(10);
        }

        let p = game.state.player(typist).unwrap();
        assert!(p.errors >= max_errors);
        assert!(p.is_finished);
        assert_eq!(p.lives, Some(0));
        assert!(game.is_over());
    }

    #[test]
    fn test_disconnected_players_stop_spawning() {
        let mut game = block_game(2);
        let ids: Vec<PlayerId> = game.state.players.keys().copied().collect();
        game.set_connected(ids[0], false, Utc::now());
        game.tick(FIRST_SPAWN_MS + 100);
        assert!(blocks_of(&game).iter().all(|b| b.player_id != ids[0]));
    }
}
