//! The game variants. Each module supplies the initial shared state for
//! its variant and a `GameLogic` implementation the engine drives.

use rand::rngs::StdRng;

use game_types::{GameSettings, GameSpecificState, GameType};

use crate::engine::GameLogic;

pub mod blink;
pub mod falling_blocks;
pub mod falling_words;
pub mod speed_race;
pub mod typing_walk;

/// Playfield coordinates used by the falling variants. Positions are
/// percentages so clients can scale freely; a piece lands when its y
/// reaches the bottom.
pub const FIELD_WIDTH: f32 = 100.0;
pub const FIELD_BOTTOM: f32 = 100.0;

pub fn create(
    game_type: GameType,
    settings: &GameSettings,
    rng: &mut StdRng,
) -> (GameSpecificState, Box<dyn GameLogic>) {
    match game_type {
        GameType::FallingBlocks => falling_blocks::create(settings),
        GameType::Blink => blink::create(settings, rng),
        GameType::TypingWalk => typing_walk::create(settings, rng),
        GameType::FallingWords => falling_words::create(settings),
        GameType::SpeedRace => speed_race::create(settings, rng),
    }
}
