pub mod leaderboard_repository;
pub mod session_repository;

pub use leaderboard_repository::LeaderboardRepository;
pub use session_repository::SessionRepository;
