//! The sync engine: connection state machine, diffing and rate limiting.
//!
//! One owner drives the engine by calling [`SyncEngine::tick`], typically
//! once per frame or on a short interval. Each tick:
//!
//! 1. drains transport events into the event sink, reacting to disconnects;
//! 2. advances the connection state (connect, or retry once backoff elapses);
//! 3. when connected and the send interval has passed, sends the pending
//!    snapshot if it differs from the last one sent.

use crate::{Backoff, Drain, EventSink, SyncConfig, Transport, UpdateCoalescer};
use presence_core::{
    Command, ConnectionState, Frame, FrameError, InboundEvent, PresenceSnapshot, SendError,
    ValidationError,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Extra time the engine allows a transport's own bounded close to finish
/// its cleanup.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid presence: {0}")]
    Invalid(#[from] ValidationError),
    #[error("sync engine is closed")]
    Closed,
}

/// Keeps the companion's view of the presence in step with the latest
/// snapshot the application set.
///
/// The transport is supplied by the embedding application; the engine owns it
/// until [`close`](Self::close).
pub struct SyncEngine<T: Transport> {
    transport: T,
    state: ConnectionState,
    started: bool,
    coalescer: UpdateCoalescer,
    sink: EventSink,
    backoff: Backoff,
    retry_at: Option<Instant>,
    min_send_interval: Duration,
    close_timeout: Duration,
    last_sent: Option<PresenceSnapshot>,
    last_send_at: Option<Instant>,
    next_nonce: u64,
    pid: u32,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(transport: T, config: &SyncConfig) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            started: false,
            coalescer: UpdateCoalescer::new(),
            sink: EventSink::new(),
            backoff: Backoff::from_config(config),
            retry_at: None,
            min_send_interval: config.min_send_interval,
            close_timeout: config.close_timeout,
            last_sent: None,
            last_send_at: None,
            next_nonce: 0,
            pid: std::process::id(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The snapshot the companion currently shows, as far as the engine knows.
    pub fn last_sent(&self) -> Option<&PresenceSnapshot> {
        self.last_sent.as_ref()
    }

    /// Normalize and validate `snapshot`, then buffer it for the next send.
    ///
    /// Never blocks. Replaces any snapshot that has not been sent yet.
    pub fn set_presence(&mut self, snapshot: PresenceSnapshot) -> Result<(), EngineError> {
        if self.state.is_terminal() {
            return Err(EngineError::Closed);
        }
        let snapshot = snapshot.normalized();
        snapshot.validate()?;
        self.coalescer.set_presence(snapshot);
        Ok(())
    }

    /// Connect on the next tick even if nothing is pending.
    pub fn start(&mut self) {
        if !self.state.is_terminal() {
            self.started = true;
        }
    }

    /// Register a callback for inbound events. Callbacks run inside
    /// [`drain`](Self::drain).
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        self.sink.on_event(handler);
    }

    /// Deliver queued events to callbacks, yielding each in arrival order.
    pub fn drain(&mut self) -> Drain<'_> {
        self.sink.drain()
    }

    pub async fn tick(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let now = Instant::now();

        let events: Vec<_> = self.transport.poll().collect();
        for event in events {
            match event {
                InboundEvent::ConnectionChanged {
                    state: ConnectionState::Disconnected,
                } => self.on_disconnect(now),
                event => self.sink.push(event),
            }
        }

        match self.state {
            ConnectionState::Disconnected if self.started || self.coalescer.has_pending() => {
                self.connect().await;
            }
            ConnectionState::Reconnecting if self.retry_at.is_none_or(|at| now >= at) => {
                self.connect().await;
            }
            _ => {}
        }

        if self.state == ConnectionState::Connected {
            self.flush(Instant::now());
        }
    }

    /// Shut down for good. Idempotent, bounded by the configured close
    /// timeout. No events are delivered afterwards.
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(ConnectionState::Closed);
        self.sink.close();
        self.coalescer.clear();
        self.retry_at = None;

        let limit = self.close_timeout + CLOSE_GRACE;
        if tokio::time::timeout(limit, self.transport.close())
            .await
            .is_err()
        {
            warn!("transport did not close within {:?}", limit);
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!(from = ?self.state, to = ?next, "presence connection state changed");
        self.state = next;
        if !next.is_terminal() {
            self.sink.push(InboundEvent::ConnectionChanged { state: next });
        }
    }

    async fn connect(&mut self) {
        self.transition(ConnectionState::Connecting);
        match self.transport.connect().await {
            Ok(()) => {
                self.backoff.reset();
                self.retry_at = None;
                self.transition(ConnectionState::Connected);
                // A fresh connection shows nothing until told again.
                if let Some(previous) = self.last_sent.take() {
                    self.coalescer.restore(previous);
                }
            }
            Err(err) => {
                warn!(%err, "presence connect failed");
                self.schedule_retry(Instant::now());
            }
        }
    }

    fn on_disconnect(&mut self, now: Instant) {
        if self.state != ConnectionState::Connected {
            debug!(state = ?self.state, "ignoring disconnect outside connected state");
            return;
        }
        self.schedule_retry(now);
    }

    fn schedule_retry(&mut self, now: Instant) {
        let delay = self.backoff.next_delay();
        debug!(?delay, "scheduling reconnect");
        self.retry_at = Some(now + delay);
        self.transition(ConnectionState::Reconnecting);
    }

    fn send_due(&self, now: Instant) -> bool {
        self.last_send_at
            .is_none_or(|at| now.duration_since(at) >= self.min_send_interval)
    }

    fn flush(&mut self, now: Instant) {
        if !self.send_due(now) {
            return;
        }
        let Some(snapshot) = self.coalescer.take_pending() else {
            return;
        };
        if self.last_sent.as_ref() == Some(&snapshot) {
            debug!("presence unchanged, skipping send");
            return;
        }

        let frame = match self.frame_for(&snapshot) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "could not encode presence");
                return;
            }
        };

        match self.transport.send(frame) {
            Ok(()) => {
                debug!(state = %snapshot.state, details = %snapshot.details, "presence sent");
                self.last_sent = Some(snapshot);
                self.last_send_at = Some(now);
            }
            Err(SendError::Backpressure) => {
                debug!("transport busy, retrying next tick");
                self.coalescer.restore(snapshot);
            }
            Err(SendError::NotConnected) => {
                warn!("transport lost connection during send");
                self.coalescer.restore(snapshot);
                self.schedule_retry(now);
            }
        }
    }

    fn frame_for(&mut self, snapshot: &PresenceSnapshot) -> Result<Frame, FrameError> {
        self.next_nonce += 1;
        Command::set_activity(
            self.pid,
            Some(&snapshot.to_activity()),
            self.next_nonce.to_string(),
        )
        .to_frame()
    }
}
