//! slirc-client - IRC client protocol engine.
//!
//! Owns one connection to an IRC server: registration, keepalive, a
//! rate-limited outgoing queue, channel and user state tracking, and
//! dispatch of typed events to async handlers. Reconnects with backoff after
//! transport failures.
//!
//! ```no_run
//! use slirc_client::{Client, Config, Event, EventKind};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut config = Config::new("irc.libera.chat", "slirc-bot");
//! config.server.tls = true;
//!
//! let client = Client::new(config)?;
//! client.on(EventKind::Message, |client, event| async move {
//!     if let Event::Message { target, text, is_channel: true, .. } = &*event
//!         && text == "!ping"
//!     {
//!         client.privmsg(target, "pong")?;
//!     }
//!     anyhow::Ok(())
//! });
//! client.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Wire-level types (parsing, framing, ISUPPORT, modes) live in the
//! [`slirc_proto`] crate and are re-exported as [`proto`].

mod builtins;
mod client;
pub mod config;
pub mod connection;
mod dispatch;
pub mod error;
pub mod event;
mod queue;
pub mod state;

pub use slirc_proto as proto;

pub use client::Client;
pub use config::Config;
pub use connection::{ConnectionState, Connector, TcpConnector};
pub use dispatch::HandlerFuture;
pub use error::{EngineError, EngineResult};
pub use event::{Event, EventKind};
pub use state::{Channel, Membership, ProtocolState, ServerInfo, User};
