use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub type PlayerId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PlayerType {
    User,  // Authenticated account
    Guest, // Device-fingerprint identity
}

/// Stable identity for a connection, resolved once per session from
/// either an authenticated user id or a guest device id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerIdentity {
    pub player_id: PlayerId,
    pub player_type: PlayerType,
    pub display_name: String,
}
