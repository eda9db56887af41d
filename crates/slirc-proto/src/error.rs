//! Error types for the IRC protocol library.
//!
//! [`ProtocolError`] covers framing and transport-level failures that are
//! fatal to a connection. [`MessageParseError`] describes why a single line
//! could not be turned into a [`Message`](crate::Message); callers usually
//! drop that line and carry on.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line (or an unterminated partial line) exceeded the maximum length.
    ///
    /// Both values include the two-byte line terminator.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Length of the offending line.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Outgoing line contained an embedded CR or LF.
    #[error("line contains an embedded line terminator")]
    EmbeddedTerminator,

    /// Failed to parse an IRC message.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The invalid message string.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

impl ProtocolError {
    /// Returns true if this error came from the peer exceeding line limits.
    pub fn is_oversized(&self) -> bool {
        matches!(self, ProtocolError::MessageTooLong { .. })
    }
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty (or only whitespace).
    #[error("empty message")]
    EmptyMessage,

    /// Command was invalid or missing.
    #[error("invalid command")]
    InvalidCommand,

    /// Prefix marker was present but no prefix followed it.
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
}
