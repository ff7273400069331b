//! Error types for RCON operations.

use thiserror::Error;

/// Errors that can occur while talking to an RCON listener.
#[derive(Error, Debug)]
pub enum RconError {
    /// The TCP connection could not be established.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server rejected the password.
    #[error("authentication rejected by {0}")]
    Auth(String),

    /// An operation did not finish in time.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The command body is longer than the server accepts.
    #[error("command is {0} bytes, limit is {max}", max = crate::packet::MAX_REQUEST_BODY)]
    CommandTooLong(usize),

    /// The peer sent something that is not an RCON packet.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection was closed.
    #[error("connection closed")]
    Closed,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RCON operations.
pub type Result<T> = std::result::Result<T, RconError>;
