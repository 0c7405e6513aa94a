//! Published coordinator state
//!
//! Each setter fires the matching [`StreamEvent`] only when the value
//! actually changes.

use crate::events::{StreamEvent, StreamEvents};

/// Observable state of a streaming coordinator
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamState {
    /// A transition is running
    pub is_loading: bool,
    /// All load tasks of the running transition crossed the readiness threshold
    pub is_ready: bool,
    /// Caller intent to activate deferred units
    pub is_activated: bool,
    /// Aggregated progress in [0, 1]
    pub value: f32,
}

impl StreamState {
    /// Create the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or finish loading.
    ///
    /// Always clears `is_ready` and `is_activated`, so an activation intent
    /// never carries over into the next transition.
    pub fn set_loading(&mut self, loading: bool, events: &mut StreamEvents) {
        if loading == self.is_loading {
            return;
        }

        self.is_loading = loading;
        self.is_activated = false;
        self.is_ready = false;

        events.emit(if loading {
            StreamEvent::Started
        } else {
            StreamEvent::Completed
        });
    }

    /// Publish a new progress value (clamped into [0, 1])
    pub fn set_value(&mut self, value: f32, events: &mut StreamEvents) {
        let value = value.clamp(0.0, 1.0);
        if value == self.value {
            return;
        }

        self.value = value;
        events.emit(StreamEvent::Progress(value));
    }

    /// Mark readiness
    pub fn set_ready(&mut self, ready: bool, events: &mut StreamEvents) {
        if ready == self.is_ready {
            return;
        }

        self.is_ready = ready;
        if ready {
            events.emit(StreamEvent::Ready);
        }
    }
}
