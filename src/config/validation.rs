//! Post-parse validation that CLI flags alone can't express (§4.3, §9).

use super::types::{ConfigError, ServerSettings};

/// A room needs at least two members to ever seal (§4.3's `P >= 2`).
pub fn validate_server_settings(settings: &ServerSettings) -> Result<(), ConfigError> {
    if settings.room_capacity < 2 {
        return Err(ConfigError::RoomTooSmall(settings.room_capacity));
    }
    Ok(())
}
