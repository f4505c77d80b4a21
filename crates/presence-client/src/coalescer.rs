//! Single-slot buffer between `set_presence` and the engine's tick.
//!
//! Only the newest snapshot matters: the companion rate-limits updates, so
//! forwarding every call would be wasted. A newer snapshot overwrites the
//! pending one instead of queueing behind it.

use presence_core::PresenceSnapshot;

#[derive(Debug, Default)]
pub struct UpdateCoalescer {
    pending: Option<PresenceSnapshot>,
    superseded: u64,
}

impl UpdateCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `snapshot`, replacing anything not yet taken. Never fails.
    pub fn set_presence(&mut self, snapshot: PresenceSnapshot) {
        if self.pending.replace(snapshot).is_some() {
            self.superseded += 1;
        }
    }

    /// Take the pending snapshot, leaving the slot empty.
    pub fn take_pending(&mut self) -> Option<PresenceSnapshot> {
        self.pending.take()
    }

    /// Put back a snapshot that could not be sent. A newer snapshot that
    /// arrived in the meantime wins.
    pub fn restore(&mut self, snapshot: PresenceSnapshot) {
        if self.pending.is_none() {
            self.pending = Some(snapshot);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// How many snapshots were overwritten before being taken.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
