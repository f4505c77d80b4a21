//! Scripted in-memory transport for engine tests.

use crate::Transport;
use presence_core::{
    Command, ConnectError, ConnectionState, Frame, InboundEvent, PresenceSnapshot, SendError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    connect_failures: VecDeque<ConnectError>,
    connected: bool,
    backpressure: bool,
    sent: Vec<Frame>,
    inbound: VecDeque<InboundEvent>,
    connects: usize,
    closes: usize,
    close_delay: Duration,
}

/// Test-side view of a [`MockTransport`].
#[derive(Debug, Clone, Default)]
pub(crate) struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Make the next `n` connects fail as unavailable.
    pub fn fail_connects(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..n {
            state
                .connect_failures
                .push_back(ConnectError::Unavailable("scripted".to_string()));
        }
    }

    /// Make `close` take `delay` before it finishes.
    pub fn set_close_delay(&self, delay: Duration) {
        self.state.lock().unwrap().close_delay = delay;
    }

    pub fn set_backpressure(&self, on: bool) {
        self.state.lock().unwrap().backpressure = on;
    }

    /// Drop the link without telling anyone.
    pub fn sever(&self) {
        self.state.lock().unwrap().connected = false;
    }

    /// Drop the link and report it the way a real transport would.
    pub fn disconnect(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.inbound.push_back(InboundEvent::ConnectionChanged {
            state: ConnectionState::Disconnected,
        });
    }

    pub fn push_event(&self, event: InboundEvent) {
        self.state.lock().unwrap().inbound.push_back(event);
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Every snapshot carried by a sent `SET_ACTIVITY` frame, in send order.
    pub fn sent_snapshots(&self) -> Vec<PresenceSnapshot> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter_map(|frame| frame.parse::<Command>().ok())
            .filter_map(|cmd| cmd.activity().ok().flatten())
            .map(|activity| PresenceSnapshot::from_activity(activity).unwrap())
            .collect()
    }
}

pub(crate) struct MockTransport {
    handle: MockHandle,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        let mut state = self.handle.state.lock().unwrap();
        state.connects += 1;
        if let Some(err) = state.connect_failures.pop_front() {
            return Err(err);
        }
        state.connected = true;
        Ok(())
    }

    fn send(&mut self, frame: Frame) -> Result<(), SendError> {
        let mut state = self.handle.state.lock().unwrap();
        if !state.connected {
            return Err(SendError::NotConnected);
        }
        if state.backpressure {
            return Err(SendError::Backpressure);
        }
        state.sent.push(frame);
        Ok(())
    }

    fn poll(&mut self) -> impl Iterator<Item = InboundEvent> + '_ {
        let events: Vec<_> = self.handle.state.lock().unwrap().inbound.drain(..).collect();
        events.into_iter()
    }

    async fn close(&mut self) {
        let delay = self.handle.state.lock().unwrap().close_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.handle.state.lock().unwrap();
        state.closes += 1;
        state.connected = false;
        state.inbound.clear();
    }
}
