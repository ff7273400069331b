//! Error types for the runtime crate.

use std::path::PathBuf;

use thiserror::Error;

use mcpm_models::ServerId;

/// Errors that can occur in the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Another live manager already uses this name.
    #[error("a server named '{0}' is already registered")]
    DuplicateName(ServerId),

    /// A configured path does not exist or cannot be resolved.
    #[error("invalid path {}: {source}", path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A charset label is not known.
    #[error("unknown charset: {0}")]
    UnknownCharset(String),

    /// A launch command line cannot be parsed.
    #[error("invalid launch command: {0:?}")]
    InvalidCommand(String),

    /// A pattern override is invalid.
    #[error("pattern error: {0}")]
    Patterns(#[from] mcpm_patterns::PatternError),

    /// A config file cannot be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The server process could not be started.
    #[error("failed to start server '{server}': {source}")]
    Spawn {
        server: ServerId,
        #[source]
        source: std::io::Error,
    },

    /// The server process was started without one of its pipes.
    #[error("server '{server}' has no {stream} pipe")]
    StreamUnavailable {
        server: ServerId,
        stream: &'static str,
    },

    /// RCON error.
    #[error("rcon error: {0}")]
    Rcon(#[from] mcpm_rcon::RconError),

    /// A line could not be classified.
    #[error("classify error: {0}")]
    Classify(#[from] mcpm_patterns::ClassifyError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The manager closed before the operation finished.
    #[error("server manager closed")]
    Closed,

    /// No server with this name is managed.
    #[error("unknown server: {0}")]
    UnknownServer(ServerId),

    /// Runtime not started.
    #[error("runtime not started")]
    NotStarted,

    /// Runtime already started.
    #[error("runtime already started")]
    AlreadyStarted,

    /// Shutdown error.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
