//! Connection lifecycle state machine.
//!
//! ```text
//! ┌──────────────┐ connect ┌────────────┐ transport ┌─────────────┐ 001 ┌────────────┐
//! │ Disconnected ├────────►│ Connecting ├──────────►│ Registering ├────►│ Registered │
//! └──────▲───────┘         └─────┬──────┘           └──────┬──────┘     └─────┬──────┘
//!        │                       │    collision / timeout  │                  │
//!        │                       ▼                         ▼                  │
//!        │ transport closed ┌───────────────┐◄────────────────────────────────┘
//!        └──────────────────┤ Disconnecting │   quit / violation / timeout
//!                           └───────────────┘
//! ```
//!
//! [`Session`] is sans-IO: it consumes parsed messages and the current time
//! and returns [`SessionAction`]s for the reader loop to carry out. Time is
//! always passed in, so every deadline can be driven from a paused tokio
//! clock in tests.

use std::fmt;
use std::time::Duration;

use slirc_proto::{Casemapping, Message, Response};
use tokio::time::Instant;

use crate::config::{Config, NickCollisionStrategy};
use crate::error::{EngineError, EngineResult};

// ============================================================================
// States
// ============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport. Terminal for one attempt.
    #[default]
    Disconnected,
    /// Resolving and opening the transport.
    Connecting,
    /// NICK/USER sent, waiting for 001.
    Registering,
    /// 001 received.
    Registered,
    /// Tearing down; no further input is processed.
    Disconnecting,
}

impl ConnectionState {
    /// The transition table.
    pub fn can_transition_to(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Registering)
                | (Connecting, Disconnecting)
                | (Registering, Registered)
                | (Registering, Disconnecting)
                | (Registered, Disconnecting)
                | (Connecting | Registering | Registered | Disconnecting, Disconnected)
        )
    }

    /// True while a transport is open and not being torn down.
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Registering | Self::Registered)
    }

    #[inline]
    pub fn is_registered(self) -> bool {
        self == Self::Registered
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Registering => "registering",
            Self::Registered => "registered",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Session
// ============================================================================

/// What the reader loop must do after feeding the session.
#[derive(Debug)]
pub enum SessionAction {
    /// Write immediately, bypassing the outgoing queue.
    Send(Message),
    /// Registration completed under this nickname.
    Registered { nickname: String },
    /// The connection cannot continue. The session is already Disconnecting.
    Fatal(EngineError),
}

/// Per-connection lifecycle, registration and keepalive bookkeeping.
#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    nickname: String,
    casemapping: Casemapping,

    // Identity
    primary_nick: String,
    alt_nicknames: Vec<String>,
    username: String,
    realname: String,
    password: Option<String>,
    collision: NickCollisionStrategy,
    max_nick_attempts: u32,

    // Registration progress
    nick_attempts: u32,
    alt_index: usize,
    registration_deadline: Option<Instant>,

    // Keepalive
    registration_timeout: Duration,
    inactivity_timeout: Duration,
    ping_interval: Duration,
    last_activity: Instant,
    probe_sent: bool,
    probe_seq: u64,
}

impl Session {
    pub fn new(config: &Config, now: Instant) -> Self {
        let identity = &config.identity;
        Self {
            state: ConnectionState::Disconnected,
            nickname: identity.nickname.clone(),
            casemapping: Casemapping::default(),
            primary_nick: identity.nickname.clone(),
            alt_nicknames: identity.alt_nicknames.clone(),
            username: identity.username().to_owned(),
            realname: identity.realname().to_owned(),
            password: config.server.password.clone(),
            collision: identity.nick_collision,
            max_nick_attempts: identity.max_nick_attempts,
            nick_attempts: 0,
            alt_index: 0,
            registration_deadline: None,
            registration_timeout: config.timing.registration_timeout(),
            inactivity_timeout: config.timing.inactivity_timeout(),
            ping_interval: config.timing.ping_interval(),
            last_activity: now,
            probe_sent: false,
            probe_seq: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current (or currently attempted) nickname.
    #[inline]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Casemapping used to recognize our own NICK changes.
    pub fn set_casemapping(&mut self, casemapping: Casemapping) {
        self.casemapping = casemapping;
    }

    /// Move to `to`, or fail with [`EngineError::InvalidTransition`].
    pub fn transition(&mut self, to: ConnectionState) -> EngineResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from: self.state, to });
        }
        self.state = to;
        if to != ConnectionState::Registering {
            self.registration_deadline = None;
        }
        Ok(())
    }

    /// Enter Disconnecting from any live state. No-op otherwise.
    pub fn begin_disconnect(&mut self) {
        if self.state.can_transition_to(ConnectionState::Disconnecting) {
            self.state = ConnectionState::Disconnecting;
            self.registration_deadline = None;
        }
    }

    /// The transport is gone.
    pub fn closed(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            self.registration_deadline = None;
        }
    }

    /// Transport is up: arm the registration deadline and return the
    /// handshake lines (`PASS`, `NICK`, `USER`).
    pub fn transport_established(&mut self, now: Instant) -> EngineResult<Vec<Message>> {
        self.transition(ConnectionState::Registering)?;
        self.nickname = self.primary_nick.clone();
        self.nick_attempts = 0;
        self.alt_index = 0;
        self.registration_deadline = Some(now + self.registration_timeout);
        self.last_activity = now;
        self.probe_sent = false;

        let mut lines = Vec::with_capacity(3);
        if let Some(password) = &self.password {
            lines.push(Message::pass(password));
        }
        lines.push(Message::nick(&self.nickname));
        lines.push(Message::user(&self.username, &self.realname));
        Ok(lines)
    }

    /// Inbound bytes that did not make a message still prove the peer is alive.
    pub fn note_activity(&mut self, now: Instant) {
        if self.state.is_connected() {
            self.last_activity = now;
            self.probe_sent = false;
        }
    }

    /// Feed one inbound message. Any inbound traffic counts as activity.
    pub fn on_message(&mut self, msg: &Message, now: Instant) -> Vec<SessionAction> {
        if !self.state.is_connected() {
            return Vec::new();
        }
        self.last_activity = now;
        self.probe_sent = false;

        let mut actions = Vec::new();
        if msg.command.is("PING") {
            actions.push(SessionAction::Send(Message::pong(msg.last_arg().unwrap_or_default())));
        } else if msg.command.is("ERROR") {
            let reason = msg.last_arg().unwrap_or("connection closed").to_owned();
            actions.push(self.fail(EngineError::ServerError(reason)));
        } else if msg.command.is("NICK") {
            if let (Some(old), Some(new)) = (msg.source_nick(), msg.arg(0))
                && self.casemapping.equals(old, &self.nickname)
            {
                self.nickname = new.to_owned();
            }
        } else if msg.is_response(Response::RPL_WELCOME) {
            if self.state == ConnectionState::Registering {
                if let Some(nick) = msg.arg(0).filter(|n| !n.is_empty() && *n != "*") {
                    self.nickname = nick.to_owned();
                }
                self.state = ConnectionState::Registered;
                self.registration_deadline = None;
                actions.push(SessionAction::Registered {
                    nickname: self.nickname.clone(),
                });
            }
        } else if self.state == ConnectionState::Registering
            && msg.command.response().is_some_and(Response::is_nick_rejection)
        {
            match self.next_nickname() {
                Some(nick) => {
                    self.nickname = nick;
                    actions.push(SessionAction::Send(Message::nick(&self.nickname)));
                }
                None => {
                    let nick = self.nickname.clone();
                    actions.push(self.fail(EngineError::NicknameCollision(nick)));
                }
            }
        }
        actions
    }

    /// Check deadlines. Called whenever the reader wakes up.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.registration_deadline.is_some_and(|deadline| now >= deadline) {
            return vec![self.fail(EngineError::RegistrationTimeout)];
        }
        if !self.state.is_connected() {
            return Vec::new();
        }

        let idle = now.saturating_duration_since(self.last_activity);
        if idle >= self.inactivity_timeout {
            return vec![self.fail(EngineError::ConnectionTimeout)];
        }
        if self.state.is_registered() && !self.probe_sent && idle >= self.ping_interval {
            self.probe_sent = true;
            self.probe_seq += 1;
            let token = format!("slirc-{}", self.probe_seq);
            return vec![SessionAction::Send(Message::ping(&token))];
        }
        Vec::new()
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.state.is_connected() {
            return None;
        }
        let mut deadline = self.last_activity + self.inactivity_timeout;
        if let Some(registration) = self.registration_deadline {
            deadline = deadline.min(registration);
        }
        if self.state.is_registered() && !self.probe_sent {
            deadline = deadline.min(self.last_activity + self.ping_interval);
        }
        Some(deadline)
    }

    /// Alternates in order, then `_` suffixes, within the attempt budget.
    fn next_nickname(&mut self) -> Option<String> {
        if self.nick_attempts >= self.max_nick_attempts {
            return None;
        }
        let next = match self.alt_nicknames.get(self.alt_index) {
            Some(alt) => {
                self.alt_index += 1;
                alt.clone()
            }
            None => match self.collision {
                NickCollisionStrategy::AppendUnderscore => format!("{}_", self.nickname),
                NickCollisionStrategy::Fail => return None,
            },
        };
        self.nick_attempts += 1;
        Some(next)
    }

    fn fail(&mut self, err: EngineError) -> SessionAction {
        self.begin_disconnect();
        SessionAction::Fatal(err)
    }
}
