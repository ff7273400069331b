//! Error types for event delivery.

use thiserror::Error;

/// Errors that can occur while receiving events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Every sender of the channel is gone.
    #[error("event channel closed")]
    Closed,
}

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
