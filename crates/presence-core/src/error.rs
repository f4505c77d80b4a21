//! Error taxonomy.
//!
//! Connection-level errors are recovered by the sync engine and only ever
//! reach the application as connection-state events. Validation errors are
//! returned directly to whoever built the bad snapshot.

use crate::Timestamp;

/// A snapshot broke one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is {len} characters, limit is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("party id cannot be empty")]
    EmptyPartyId,
    #[error("party size {size} exceeds party max {max}")]
    PartyOverflow { size: u32, max: u32 },
    #[error("end time {end} is before start time {start}")]
    EndBeforeStart { start: Timestamp, end: Timestamp },
}

/// Opening a connection to the companion failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// No endpoint could be reached, or the handshake timed out.
    #[error("companion unavailable: {0}")]
    Unavailable(String),
    /// The companion rejected the handshake or answered with another version.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),
}

/// Handing a frame to the transport failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    /// The outbound slot is occupied. Retry on a later tick.
    #[error("outbound channel is full")]
    Backpressure,
}

/// Failures observed on an established connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection dropped unexpectedly: {0}")]
    UnexpectedDisconnect(String),
}

/// A frame could not be encoded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("payload of {0} bytes exceeds frame limit")]
    TooLarge(usize),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}
