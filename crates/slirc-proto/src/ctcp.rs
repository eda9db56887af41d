//! CTCP (Client-to-Client Protocol) framing.
//!
//! CTCP payloads ride inside PRIVMSG (requests) and NOTICE (replies)
//! bodies, wrapped in `\x01`.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>
//!
//! # Example
//!
//! ```
//! use slirc_proto::ctcp::{Ctcp, CtcpKind};
//!
//! let ctcp = Ctcp::parse("\x01ACTION waves hello\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Action);
//! assert_eq!(ctcp.params, Some("waves hello"));
//!
//! assert_eq!(Ctcp::action("dances").to_string(), "\x01ACTION dances\x01");
//! ```

use std::fmt;

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// CTCP command types the client knows how to talk about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// ACTION - `/me` style emote. Never answered.
    Action,
    /// VERSION - client name and version.
    Version,
    /// PING - echo of the sender's token for latency measurement.
    Ping,
    /// TIME - local time of the receiving client.
    Time,
    /// CLIENTINFO - list of supported CTCP commands.
    Clientinfo,
    /// SOURCE - where to get the client.
    Source,
    /// Anything else, kept verbatim.
    Unknown(String),
}

impl CtcpKind {
    /// Parse a CTCP command name (case-insensitive).
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "PING" => Self::Ping,
            "TIME" => Self::Time,
            "CLIENTINFO" => Self::Clientinfo,
            "SOURCE" => Self::Source,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Ping => "PING",
            Self::Time => "TIME",
            Self::Clientinfo => "CLIENTINFO",
            Self::Source => "SOURCE",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CTCP payload borrowed from a message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The CTCP command.
    pub kind: CtcpKind,
    /// Text after the command, if any.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a PRIVMSG/NOTICE body.
    ///
    /// Returns `None` when the body is not CTCP. A missing closing
    /// delimiter is tolerated.
    pub fn parse(text: &'a str) -> Option<Self> {
        let inner = text.strip_prefix(CTCP_DELIM)?;
        let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);

        let (command, params) = match inner.split_once(' ') {
            Some((command, params)) => (command, Some(params).filter(|p| !p.is_empty())),
            None => (inner, None),
        };
        if command.is_empty() {
            return None;
        }

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Check if a message body is CTCP-framed.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// Build a CTCP payload.
    pub fn new(kind: CtcpKind, params: Option<&'a str>) -> Self {
        Self { kind, params }
    }

    /// An ACTION payload.
    pub fn action(text: &'a str) -> Self {
        Self::new(CtcpKind::Action, Some(text))
    }

    /// True for ACTION, which is a message rather than a request.
    pub fn is_action(&self) -> bool {
        self.kind == CtcpKind::Action
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CTCP_DELIM, self.kind)?;
        if let Some(params) = self.params {
            write!(f, " {}", params)?;
        }
        write!(f, "{}", CTCP_DELIM)
    }
}
