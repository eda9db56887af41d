//! # slirc-proto
//!
//! Wire-level building blocks for IRC clients.
//!
//! ## Features
//!
//! - Line framing that tolerates CR, LF and CRLF terminators, with a
//!   configurable maximum line length ([`LineFramer`], and [`LineCodec`]
//!   for tokio with the default `tokio` feature)
//! - Message parsing and serialization ([`Message`], [`Command`], [`Prefix`])
//! - Named numeric replies ([`Response`])
//! - CTCP framing ([`ctcp`])
//! - ISUPPORT tracking, including `PREFIX` and `CHANMODES` ([`Isupport`])
//! - ISUPPORT-aware mode string parsing ([`mode`])
//! - Server case mappings ([`Casemapping`])
//!
//! ## Quick Start
//!
//! ```rust
//! use slirc_proto::{LineFramer, Message};
//!
//! let mut framer = LineFramer::new();
//! for line in framer.feed(b":irc.example.com 001 bob :Welcome\r\n") {
//!     let msg = Message::parse(&line.unwrap()).unwrap();
//!     assert_eq!(msg.arg(0), Some("bob"));
//! }
//!
//! assert_eq!(Message::privmsg("#rust", "hi").to_string(), "PRIVMSG #rust :hi");
//! ```
//!
//! ## Acknowledgments
//!
//! This project was inspired by the architectural patterns established by
//! [Aaron Weiss (aatxe)](https://github.com/aatxe) in the
//! [irc](https://github.com/aatxe/irc) crate.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod command;
pub mod ctcp;
pub mod error;
pub mod isupport;
pub mod line;
pub mod message;
pub mod mode;
pub mod prefix;
pub mod response;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower, Casemapping};
pub use self::command::Command;
pub use self::ctcp::{Ctcp, CtcpKind};
pub use self::error::{MessageParseError, ProtocolError};
pub use self::isupport::{ChanModeKind, ChanModes, Isupport, PrefixSpec};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::line::{LineFramer, Lines, DEFAULT_MAX_LINE_LEN};
pub use self::message::Message;
pub use self::mode::ModeChange;
pub use self::prefix::Prefix;
pub use self::response::Response;
