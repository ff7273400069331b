//! Error types for pattern building and classification.

use thiserror::Error;

/// Errors that can occur while building a pattern set.
#[derive(Error, Debug)]
pub enum PatternError {
    /// A pattern did not compile.
    #[error("invalid pattern '{name}': {source}")]
    Regex {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// A pattern lacks a named group the classifier reads.
    #[error("pattern '{pattern}' has no capture group named '{group}'")]
    MissingGroup { pattern: String, group: &'static str },
}

/// Errors that can occur while classifying a line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// A chat or join/leave line carried a name that is not a valid player name.
    #[error("invalid player name '{name}' in line: {content:?}")]
    InvalidPlayerName { name: String, content: String },
}

/// Result type alias for pattern building.
pub type Result<T> = std::result::Result<T, PatternError>;
