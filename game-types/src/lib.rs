pub mod errors;
pub mod game;
pub mod identity;
pub mod leaderboard;
pub mod messages;
pub mod room;
pub mod session;

// Re-export all types
pub use errors::*;
pub use game::*;
pub use identity::*;
pub use leaderboard::*;
pub use messages::*;
pub use room::*;
pub use session::*;
