//! The seam between the sync engine and whatever carries frames.

use presence_core::{ConnectError, Frame, InboundEvent, SendError};
use std::future::Future;

/// One logical connection to the companion.
///
/// Implementations do their I/O elsewhere (a task, a thread) and talk to the
/// engine only through these calls. None of them block on the network:
/// `connect` and `close` are bounded by timeouts, `send` and `poll` return
/// immediately.
pub trait Transport: Send {
    /// Open the connection and complete the handshake.
    ///
    /// Fails with [`ConnectError::Unavailable`] when no endpoint answers and
    /// [`ConnectError::ProtocolMismatch`] when the handshake is refused.
    fn connect(&mut self) -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Hand a frame to the outbound slot.
    ///
    /// [`SendError::Backpressure`] means the previous frame has not been
    /// written yet; the caller should retry later rather than wait.
    fn send(&mut self, frame: Frame) -> Result<(), SendError>;

    /// Events received since the last call, oldest first.
    ///
    /// After an unexpected disconnect the sequence contains exactly one
    /// `ConnectionChanged { Disconnected }` and nothing from that connection
    /// after it.
    fn poll(&mut self) -> impl Iterator<Item = InboundEvent> + '_;

    /// Tear the connection down. Idempotent. Once it returns no further
    /// events are produced until the next `connect`.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
