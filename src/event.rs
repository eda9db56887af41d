//! Events delivered to handlers.
//!
//! Every inbound message produces zero or more typed events followed by one
//! [`Event::Raw`]. Handlers always observe state that already reflects the
//! message.

use std::fmt;
use std::str::FromStr;

use slirc_proto::{CtcpKind, Message, ModeChange};

/// A structured event.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Event {
    /// The transport is up and registration has started.
    Connected { host: String, port: u16 },
    /// The connection is gone. `reconnecting` tells whether another
    /// attempt will follow.
    Disconnected { reason: Option<String>, reconnecting: bool },
    /// 001 received.
    Registered { nickname: String },
    /// PRIVMSG, including CTCP ACTION.
    Message {
        source: String,
        target: String,
        text: String,
        is_channel: bool,
        is_action: bool,
    },
    /// NOTICE that is not a CTCP reply.
    Notice {
        source: String,
        target: String,
        text: String,
        is_channel: bool,
    },
    Join { channel: String, nick: String },
    Part { channel: String, nick: String, reason: Option<String> },
    Kick {
        channel: String,
        nick: String,
        by: String,
        reason: Option<String>,
    },
    /// `channels` lists the channels the user was seen on.
    Quit { nick: String, reason: Option<String>, channels: Vec<String> },
    NickChange { old: String, new: String },
    /// Channel or user mode deltas.
    ModeChange { target: String, by: String, changes: Vec<ModeChange> },
    /// A topic was set, cleared, or reported on join.
    TopicChange { channel: String, topic: Option<String>, by: Option<String> },
    /// CTCP request other than ACTION.
    CtcpRequest {
        source: String,
        target: String,
        command: CtcpKind,
        params: Option<String>,
    },
    /// CTCP reply carried in a NOTICE.
    CtcpReply {
        source: String,
        target: String,
        command: CtcpKind,
        params: Option<String>,
    },
    /// End of MOTD. Empty when the server has none.
    Motd { lines: Vec<String> },
    /// Channel membership changed or a NAMES listing completed.
    Members { channel: String, nicks: Vec<String> },
    /// A recoverable or fatal problem on the connection.
    Error { code: &'static str, message: String },
    /// Every inbound message, last.
    Raw(Message),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connected { .. } => EventKind::Connect,
            Event::Disconnected { .. } => EventKind::Disconnect,
            Event::Registered { .. } => EventKind::Registered,
            Event::Message { .. } => EventKind::Message,
            Event::Notice { .. } => EventKind::Notice,
            Event::Join { .. } => EventKind::Join,
            Event::Part { .. } => EventKind::Part,
            Event::Kick { .. } => EventKind::Kick,
            Event::Quit { .. } => EventKind::Quit,
            Event::NickChange { .. } => EventKind::NickChange,
            Event::ModeChange { .. } => EventKind::ModeChange,
            Event::TopicChange { .. } => EventKind::TopicChange,
            Event::CtcpRequest { .. } => EventKind::CtcpRequest,
            Event::CtcpReply { .. } => EventKind::CtcpReply,
            Event::Motd { .. } => EventKind::Motd,
            Event::Members { .. } => EventKind::Members,
            Event::Error { .. } => EventKind::Error,
            Event::Raw(_) => EventKind::Raw,
        }
    }
}

/// Event tag used to register handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    Connect,
    Disconnect,
    Registered,
    Message,
    Notice,
    Join,
    Part,
    Kick,
    Quit,
    NickChange,
    ModeChange,
    TopicChange,
    CtcpRequest,
    CtcpReply,
    Motd,
    Members,
    Error,
    Raw,
}

impl EventKind {
    pub const ALL: [EventKind; 18] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::Registered,
        EventKind::Message,
        EventKind::Notice,
        EventKind::Join,
        EventKind::Part,
        EventKind::Kick,
        EventKind::Quit,
        EventKind::NickChange,
        EventKind::ModeChange,
        EventKind::TopicChange,
        EventKind::CtcpRequest,
        EventKind::CtcpReply,
        EventKind::Motd,
        EventKind::Members,
        EventKind::Error,
        EventKind::Raw,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Registered => "registered",
            EventKind::Message => "message",
            EventKind::Notice => "notice",
            EventKind::Join => "join",
            EventKind::Part => "part",
            EventKind::Kick => "kick",
            EventKind::Quit => "quit",
            EventKind::NickChange => "nick-change",
            EventKind::ModeChange => "mode-change",
            EventKind::TopicChange => "topic-change",
            EventKind::CtcpRequest => "ctcp-request",
            EventKind::CtcpReply => "ctcp-reply",
            EventKind::Motd => "motd",
            EventKind::Members => "members",
            EventKind::Error => "error",
            EventKind::Raw => "raw",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_owned()))
    }
}
