//! Unified error handling for slirc-client.
//!
//! Every failure the engine can report to a consumer is an [`EngineError`].
//! Handler failures are plain `anyhow::Error` values and never reach this
//! type; they are logged at the dispatch boundary.

use slirc_proto::{MessageParseError, ProtocolError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::connection::ConnectionState;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Connection refused, reset, or closed by the peer.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// TLS setup or handshake failure.
    #[error("tls error: {0}")]
    Tls(String),

    /// Oversized line or other framing failure. Fatal to the connection.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// A single inbound line could not be parsed. The line is dropped.
    #[error("parse error in {line:?}: {cause}")]
    Parse {
        /// The offending line.
        line: String,
        /// Why it was rejected.
        #[source]
        cause: MessageParseError,
    },

    /// 001 did not arrive before the registration deadline.
    #[error("registration timed out")]
    RegistrationTimeout,

    /// Nothing was received within the inactivity timeout.
    #[error("connection timed out")]
    ConnectionTimeout,

    /// The server rejected every nickname we were allowed to try.
    #[error("nickname collision: {0}")]
    NicknameCollision(String),

    /// The server sent `ERROR` and is closing the link.
    #[error("server closed link: {0}")]
    ServerError(String),

    /// The command requires a registered connection.
    #[error("not registered")]
    NotRegistered,

    /// There is no live connection.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called while a session is running.
    #[error("already connected")]
    AlreadyConnected,

    /// The connection state machine refused a transition.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted transition.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },

    /// A raw line contained CR or LF.
    #[error("line contains CR or LF")]
    InvalidLine,

    /// The name is not a channel on this server.
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    /// `part` was called for a channel we are not on.
    #[error("not on channel: {0}")]
    NotOnChannel(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Tls(_) => "tls_error",
            Self::Protocol(_) => "protocol_violation",
            Self::Parse { .. } => "parse_error",
            Self::RegistrationTimeout => "registration_timeout",
            Self::ConnectionTimeout => "connection_timeout",
            Self::NicknameCollision(_) => "nickname_collision",
            Self::ServerError(_) => "server_error",
            Self::NotRegistered => "not_registered",
            Self::NotConnected => "not_connected",
            Self::AlreadyConnected => "already_connected",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidLine => "invalid_line",
            Self::InvalidChannel(_) => "invalid_channel",
            Self::NotOnChannel(_) => "not_on_channel",
            Self::Config(_) => "config_error",
        }
    }

    /// Whether losing a connection to this error should consult the
    /// reconnection policy.
    ///
    /// Timeouts count as transport failures. A nickname collision would
    /// only repeat, so it ends the session.
    pub fn is_reconnectable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Tls(_)
                | Self::Protocol(_)
                | Self::RegistrationTimeout
                | Self::ConnectionTimeout
                | Self::ServerError(_)
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
