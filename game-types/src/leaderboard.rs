use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{GameType, PlayerId, PlayerType, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum LeaderboardPeriod {
    AllTime,
    Daily,
    Weekly,
    Monthly,
}

impl LeaderboardPeriod {
    pub const ALL: [LeaderboardPeriod; 4] = [
        LeaderboardPeriod::AllTime,
        LeaderboardPeriod::Daily,
        LeaderboardPeriod::Weekly,
        LeaderboardPeriod::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardPeriod::AllTime => "all-time",
            LeaderboardPeriod::Daily => "daily",
            LeaderboardPeriod::Weekly => "weekly",
            LeaderboardPeriod::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<LeaderboardPeriod> {
        match s {
            "all-time" => Some(LeaderboardPeriod::AllTime),
            "daily" => Some(LeaderboardPeriod::Daily),
            "weekly" => Some(LeaderboardPeriod::Weekly),
            "monthly" => Some(LeaderboardPeriod::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScoreMetrics {
    pub wpm: f64,
    pub accuracy: f64,
    pub level: Option<u32>,
    pub time_ms: Option<u64>,
}

/// One best-score row per (player, game type, period window). Submitting a
/// non-improving score leaves the stored entry unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LeaderboardEntry {
    pub game_type: GameType,
    pub period: LeaderboardPeriod,
    pub player_id: PlayerId,
    pub player_type: PlayerType,
    pub display_name: String,
    pub score: i64,
    pub metrics: ScoreMetrics,
    pub session_id: SessionId,
    pub achieved_at: String,       // ISO 8601 string
    pub period_start: String,      // ISO 8601 string
    pub period_end: Option<String>, // absent for all-time
    /// Dense rank cached by the periodic batch job, not maintained per write.
    pub rank: Option<u32>,
    pub friend_ids: Option<Vec<PlayerId>>,
}
