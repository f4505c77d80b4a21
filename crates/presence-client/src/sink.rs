//! Delivery of inbound events to application callbacks.

use presence_core::InboundEvent;
use std::collections::VecDeque;

type Handler = Box<dyn FnMut(&InboundEvent) + Send>;

/// Ordered queue of events plus the callbacks that receive them.
///
/// Events are handed to callbacks only while being drained, so callbacks
/// always run on the thread that drives the engine.
#[derive(Default)]
pub struct EventSink {
    queue: VecDeque<InboundEvent>,
    handlers: Vec<Handler>,
    closed: bool,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Callbacks run in registration order.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Queue an event. Ignored once the sink is closed.
    pub fn push(&mut self, event: InboundEvent) {
        if !self.closed {
            self.queue.push_back(event);
        }
    }

    /// Deliver queued events in arrival order.
    ///
    /// Each event is passed to every callback and then yielded. Only events
    /// queued at the time of the call are produced; call again on the next
    /// tick for more.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { sink: self }
    }

    /// Drop everything queued and refuse further events.
    pub fn close(&mut self) {
        self.closed = true;
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("queued", &self.queue.len())
            .field("handlers", &self.handlers.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Iterator returned by [`EventSink::drain`].
pub struct Drain<'a> {
    sink: &'a mut EventSink,
}

impl Iterator for Drain<'_> {
    type Item = InboundEvent;

    fn next(&mut self) -> Option<InboundEvent> {
        let event = self.sink.queue.pop_front()?;
        for handler in &mut self.sink.handlers {
            handler(&event);
        }
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.sink.queue.len(), Some(self.sink.queue.len()))
    }
}
