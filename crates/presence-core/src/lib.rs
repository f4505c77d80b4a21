//! Core types for presence sync.
//!
//! This crate provides the protocol primitives: the presence data model and
//! its validation, the companion's wire form, framing, and the error
//! taxonomy. Driving a connection lives in `presence-client`.

mod activity;
mod error;
mod event;
mod frame;
mod message;
mod snapshot;

pub use activity::{Activity, ActivityAssets, ActivityParty, ActivitySecrets, ActivityTimestamps};
pub use error::{ConnectError, FrameError, SendError, TransportError, ValidationError};
pub use event::{InboundEvent, User};
pub use frame::{Frame, Opcode, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use message::{CloseReason, Command, Dispatch, Handshake, RPC_VERSION, Ready};
pub use snapshot::{
    AssetRef, PartyInfo, PresenceBuilder, PresenceSnapshot, SecretRef, Timestamp, MAX_TEXT_LEN,
};

use serde::{Deserialize, Serialize};

/// Connection lifecycle state.
///
/// Owned by the sync engine. Transports report transitions through
/// [`InboundEvent::ConnectionChanged`]; they never set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake complete; frames may be sent.
    Connected,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
    /// Shut down. Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}
