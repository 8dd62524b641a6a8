use sha2::{Digest, Sha256};
use uuid::Uuid;

use game_types::{PlayerIdentity, PlayerType, RoomError};

pub const MAX_DISPLAY_NAME_LEN: usize = 24;

/// Resolves the identity a connection acts under for the rest of its
/// session. Authenticated clients bring their account id; everyone else
/// gets a guest id derived from their device fingerprint, so the same
/// device resolves to the same player across reconnects.
pub struct IdentityResolver;

impl IdentityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        user_id: Option<Uuid>,
        device_id: &str,
        display_name: &str,
    ) -> Result<PlayerIdentity, RoomError> {
        let display_name = validate_display_name(display_name)?;

        match user_id {
            Some(id) => Ok(PlayerIdentity {
                player_id: id,
                player_type: PlayerType::User,
                display_name,
            }),
            None => {
                let device_id = device_id.trim();
                if device_id.is_empty() {
                    return Err(RoomError::invalid_parameters(
                        "device_id must not be empty for guest identities",
                    ));
                }
                Ok(PlayerIdentity {
                    player_id: guest_id(device_id),
                    player_type: PlayerType::Guest,
                    display_name,
                })
            }
        }
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic guest id: the first 16 bytes of a SHA-256 over the
/// device fingerprint. The raw fingerprint never leaves this function.
fn guest_id(device_id: &str) -> Uuid {
    let digest = Sha256::digest(device_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn validate_display_name(name: &str) -> Result<String, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RoomError::invalid_parameters("display name must not be empty"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(RoomError::invalid_parameters(format!(
            "display name must be at most {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(RoomError::invalid_parameters(
            "display name may only contain letters, digits, spaces, '-' and '_'",
        ));
    }
    Ok(name.to_string())
}
