//! Streaming lifecycle events
//!
//! Handlers are called synchronously as the coordinator changes state.
//! A frame loop that prefers polling turns on the queue with
//! [`StreamEvents::set_queued`] and empties it with [`StreamEvents::drain`].
//! The queue is off by default so subscribe-only hosts keep nothing around.

use std::fmt;

/// Lifecycle notification from the coordinator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamEvent {
    /// A transition began
    Started,
    /// Aggregated progress changed
    Progress(f32),
    /// Every load task crossed the readiness threshold
    Ready,
    /// The transition committed
    Completed,
}

/// Event handler function type
pub type StreamHandler = Box<dyn Fn(&StreamEvent) + Send + Sync>;

/// Subscriber ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Publish/subscribe surface for [`StreamEvent`]
pub struct StreamEvents {
    handlers: Vec<(SubscriberId, StreamHandler)>,
    pending: Vec<StreamEvent>,
    queued: bool,
    next_subscriber_id: u64,
}

impl StreamEvents {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            pending: Vec::new(),
            queued: false,
            next_subscriber_id: 1,
        }
    }

    /// Create a bus that also queues events for polling
    pub fn with_queue() -> Self {
        let mut events = Self::new();
        events.queued = true;
        events
    }

    /// Turn the polling queue on or off. Turning it off drops queued events.
    pub fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
        if !queued {
            self.pending.clear();
        }
    }

    /// Check if events are queued for polling
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// Subscribe to all stream events
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriberId
    where
        F: Fn(&StreamEvent) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_subscriber_id);
        self.next_subscriber_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Unsubscribe. Returns false if the ID was unknown.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub_id, _)| *sub_id != id);
        self.handlers.len() != before
    }

    /// Deliver an event to every subscriber, and queue it if polling is on
    pub fn emit(&mut self, event: StreamEvent) {
        for (_, handler) in &self.handlers {
            handler(&event);
        }
        if self.queued {
            self.pending.push(event);
        }
    }

    /// Take all queued events
    pub fn drain(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Number of queued events
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for StreamEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEvents")
            .field("subscribers", &self.handlers.len())
            .field("queued", &self.queued)
            .field("pending", &self.pending)
            .finish()
    }
}
