//! Error types for scene streaming

use crate::unit::UnitId;
use thiserror::Error;

/// Errors from the streaming coordinator
///
/// Only [`StreamError::Busy`] is ever returned from a transition request.
/// Unknown units and failed task issues are logged and skipped so that a
/// running transition always reaches its commit.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A transition is already in progress
    #[error("Cannot {operation}! Loading in progress.")]
    Busy {
        /// The rejected operation ("load" or "reset")
        operation: &'static str,
    },

    /// Unit is not part of the backend catalog
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// Backend did not hand out a task for the unit
    #[error("Failed to issue task for unit: {0}")]
    TaskIssueFailed(UnitId),

    /// Failed to read a configuration file
    #[error("Failed to read stream config: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Failed to parse a configuration file
    #[error("Failed to parse stream config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl StreamError {
    /// Check if this error rejected a request without touching any state
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;
