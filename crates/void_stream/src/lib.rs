//! Void Stream - Scene Streaming
//!
//! This crate coordinates transitions between sets of loadable units
//! (levels, zones, sub-scenes) that the engine loads and unloads
//! asynchronously.
//!
//! # Features
//!
//! - Diff-based transitions (units kept across a transition are not reloaded)
//! - Full in-place reload with active unit restore
//! - Gates that hold back the start of a transition
//! - Auto, deferred and forced activation policies
//! - One pooled progress value plus lifecycle events
//!
//! # Example
//!
//! ```ignore
//! use void_stream::prelude::*;
//!
//! let backend = MemoryBackend::new(["Hub", "Forest"]);
//! let mut stream = StreamCoordinator::new(backend, StreamConfig::load());
//!
//! stream.load(["Hub", "Forest"], TransitionMode::Default)?;
//! while stream.is_loading() {
//!     stream.backend_mut().update();
//!     stream.tick();
//! }
//! ```

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod gate;
pub mod state;
pub mod task;
pub mod unit;

pub mod prelude {
    pub use crate::backend::{BackendOp, MemoryBackend, SceneBackend};
    pub use crate::config::StreamConfig;
    pub use crate::coordinator::{
        StreamCoordinator, TransitionMode, TransitionPhase, TransitionReport,
    };
    pub use crate::error::{StreamError, StreamResult};
    pub use crate::events::{StreamEvent, StreamEvents, SubscriberId};
    pub use crate::gate::{Gate, GateGuard, GateRegistry, ManualGate};
    pub use crate::state::StreamState;
    pub use crate::task::{StreamTask, TaskKind, TaskSet, READINESS_THRESHOLD};
    pub use crate::unit::UnitId;
}

pub use prelude::*;
