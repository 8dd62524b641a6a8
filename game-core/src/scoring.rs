//! Scoring and leveling rules. Every function here is a pure function of
//! the arguments so game outcomes are replayable from recorded input.

/// Words-per-minute over the elapsed game time, using the conventional
/// five-keystrokes-per-word definition.
pub fn wpm(correct_keystrokes: u32, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    let words = correct_keystrokes as f64 / 5.0;
    let minutes = elapsed_ms as f64 / 60_000.0;
    words / minutes
}

pub fn accuracy(correct_keystrokes: u32, keystrokes: u32) -> f64 {
    if keystrokes == 0 {
        return 100.0;
    }
    correct_keystrokes as f64 * 100.0 / keystrokes as f64
}

pub fn level_for_score(score: i64) -> u32 {
    (1 + score.max(0) / 100).min(20) as u32
}

/// Spawn interval shrinks exponentially with level, bounded by a floor so
/// the game stays physically typeable at high levels.
pub fn spawn_interval_ms(level: u32) -> u64 {
    const BASE_MS: f64 = 3000.0;
    const DECAY: f64 = 0.85;
    const FLOOR_MS: f64 = 600.0;
    let interval = BASE_MS * DECAY.powi(level.saturating_sub(1) as i32);
    interval.max(FLOOR_MS) as u64
}

/// Fall speed in field units per second, scaled with level.
pub fn fall_speed(level: u32) -> f32 {
    40.0 + 8.0 * level.saturating_sub(1) as f32
}

pub fn block_points(level: u32) -> i64 {
    10 + 2 * level.saturating_sub(1) as i64
}

/// Blink rewards fast answers: a base award, a speed bonus proportional to
/// the remaining reaction window, and a capped streak bonus.
pub fn blink_points(response_ms: u64, char_time_limit_ms: u64, streak: u32) -> i64 {
    let base = 10i64;
    let remaining = char_time_limit_ms.saturating_sub(response_ms);
    let speed_bonus = if char_time_limit_ms == 0 {
        0
    } else {
        (remaining * 10 / char_time_limit_ms) as i64
    };
    base + speed_bonus + streak.min(10) as i64
}

pub fn word_points(word_len: usize, level: u32) -> i64 {
    word_len as i64 * 5 + level as i64
}

pub fn walk_step_points(streak: u32) -> i64 {
    5 + streak.min(5) as i64
}

/// Finishing a race early earns one point per unused second.
pub fn race_completion_bonus(elapsed_ms: u64, time_limit_ms: u64) -> i64 {
    (time_limit_ms.saturating_sub(elapsed_ms) / 1000) as i64
}
