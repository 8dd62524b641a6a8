pub mod game_sessions;
pub mod leaderboard_entries;

pub mod prelude {
    pub use super::game_sessions::Entity as GameSessions;
    pub use super::leaderboard_entries::Entity as LeaderboardEntries;
}
