//! Room metadata.

use serde::{Deserialize, Serialize};

/// Authoritative metadata for a room, as delivered at authentication time or by
/// `list_rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique room identifier.
    pub id: String,
    /// Display name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the room is publicly joinable.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "isPublic")]
    pub is_public: Option<bool>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
