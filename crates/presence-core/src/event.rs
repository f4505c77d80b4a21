//! Events delivered from the companion to the application.

use crate::ConnectionState;
use serde::{Deserialize, Serialize};

/// A user as the companion describes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Something that happened on the companion side, or to the connection.
///
/// Consumed once by the event sink; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Another user asked to join the player's party.
    JoinRequest { user: User },
    /// The player accepted an invite; `secret` identifies the game to join.
    Join { secret: String },
    /// The player chose to spectate; `secret` identifies the match.
    SpectateRequest { secret: String },
    /// The companion reported an error.
    Error { code: i64, message: String },
    ConnectionChanged { state: ConnectionState },
}
