//! Identifier newtypes shared by the wire protocol and the room engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identity, minted by the Auth service and carried in every
/// bearer token this engine verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A room identifier, chosen by an admin when the room is created. Plain
/// alphanumeric strings rather than UUIDs, since rooms are human-named.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Validate a room ID: non-empty, alphanumeric, fewer than 20 characters.
pub fn validate_room_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("Room ID cannot be empty".to_string());
    }
    if id.len() >= 20 {
        return Err("Room ID must be fewer than 20 characters".to_string());
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Room ID must be alphanumeric".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_room_ids() {
        assert!(validate_room_id("abc123").is_ok());
        assert!(validate_room_id("A").is_ok());
        assert!(validate_room_id("Room42").is_ok());
        assert!(validate_room_id("1234567890123456789").is_ok());
    }

    #[test]
    fn invalid_room_ids() {
        assert!(validate_room_id("").is_err());
        assert!(validate_room_id("12345678901234567890").is_err());
        assert!(validate_room_id("hello world").is_err());
        assert!(validate_room_id("room-1").is_err());
        assert!(validate_room_id("room_1").is_err());
    }

    #[test]
    fn user_id_round_trips_through_json() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
