pub mod content;
pub mod engine;
pub mod games;
pub mod ranking;
pub mod room;
pub mod scoring;

// Re-export main components
pub use engine::*;
pub use ranking::*;
pub use room::*;
