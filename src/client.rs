//! The client handle.
//!
//! [`Client`] is a cheap, cloneable handle over the shared engine: the
//! protocol state, the handler registry and the live connection (if any).
//! Handlers receive a clone, so they can query state and send commands.
//!
//! A background supervisor task owns each session: it runs the reader loop
//! for one transport, and on an unintentional disconnect consults the
//! reconnection policy before opening the next.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use slirc_proto::{Ctcp, Isupport, Message};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::builtins;
use crate::config::{Config, ConfigError, validate};
use crate::connection::event_loop;
use crate::connection::{Backoff, BoxedStream, ConnectionState, Connector, Session, TcpConnector};
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, EngineResult};
use crate::event::{Event, EventKind};
use crate::queue::{OutgoingQueue, SharedWriter};
use crate::state::{Channel, ProtocolState, ServerInfo, User};

/// Room reserved for the `:nick!user@host ` prefix the server adds when it
/// relays our messages.
const RELAY_PREFIX_RESERVE: usize = 100;

/// Handles to the live connection.
#[derive(Clone)]
pub(crate) struct Link {
    pub(crate) queue: OutgoingQueue,
    pub(crate) writer: SharedWriter,
}

struct Inner {
    config: Config,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher<Client>,
    state: RwLock<ProtocolState>,
    status: watch::Sender<ConnectionState>,
    nickname: RwLock<String>,
    link: Mutex<Option<Link>>,
    /// True from `connect` until the supervisor gives up.
    running: watch::Sender<bool>,
    quitting: AtomicBool,
    shutdown: broadcast::Sender<()>,
}

/// IRC client engine handle.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Create a client that connects over TCP/TLS.
    pub fn new(config: Config) -> EngineResult<Self> {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Create a client with a custom transport.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> EngineResult<Self> {
        validate(&config).map_err(ConfigError::Invalid)?;
        let (status, _) = watch::channel(ConnectionState::Disconnected);
        let (running, _) = watch::channel(false);
        let (shutdown, _) = broadcast::channel(4);

        let client = Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(config.timing.handler_timeout()),
                nickname: RwLock::new(config.identity.nickname.clone()),
                config,
                connector,
                state: RwLock::new(ProtocolState::new()),
                status,
                link: Mutex::new(None),
                running,
                quitting: AtomicBool::new(false),
                shutdown,
            }),
        };
        builtins::install(&client);
        Ok(client)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Register a handler for `kind`. Handlers run in registration order,
    /// after the built-in ones.
    pub fn on<F, Fut>(&self, kind: EventKind, handler: F)
    where
        F: Fn(Client, Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.dispatcher.register(kind, handler);
    }

    /// Number of handlers registered for `kind`, built-ins included.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner.dispatcher.handler_count(kind)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connect to the configured server.
    pub async fn connect(&self) -> EngineResult<()> {
        let server = &self.inner.config.server;
        self.connect_to(&server.host, server.port(), server.tls).await
    }

    /// Open the transport and start registration in the background.
    ///
    /// Returns once the transport is up. A failure here is returned as is;
    /// reconnection only applies to sessions that were established.
    pub async fn connect_to(&self, host: &str, port: u16, tls: bool) -> EngineResult<()> {
        let claimed = self.inner.running.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        });
        if !claimed {
            return Err(EngineError::AlreadyConnected);
        }
        self.inner.quitting.store(false, Ordering::SeqCst);
        let shutdown = self.inner.shutdown.subscribe();

        let (session, stream) = match self.open(host, port, tls).await {
            Ok(opened) => opened,
            Err(e) => {
                self.inner.running.send_replace(false);
                return Err(e);
            }
        };

        let client = self.clone();
        let host = host.to_owned();
        tokio::spawn(async move {
            client.supervise(session, stream, host, port, tls, shutdown).await;
        });
        Ok(())
    }

    /// Connect and wait until the session ends for good.
    pub async fn run(&self) -> EngineResult<()> {
        self.connect().await?;
        self.wait_closed().await;
        Ok(())
    }

    /// Wait until no session is active: after `quit`, a non-reconnectable
    /// failure, or exhausted reconnection attempts.
    pub async fn wait_closed(&self) {
        let mut running = self.inner.running.subscribe();
        // The sender lives in `inner`, so this cannot fail while we hold it.
        let _ = running.wait_for(|running| !*running).await;
    }

    /// Send QUIT and close the session. Pending queued lines are dropped and
    /// no reconnection follows.
    pub async fn quit(&self, reason: Option<&str>) -> EngineResult<()> {
        if !*self.inner.running.borrow() {
            return Err(EngineError::NotConnected);
        }
        self.inner.quitting.store(true, Ordering::SeqCst);
        let link = self.inner.link.lock().take();
        let result = match link {
            Some(link) => {
                link.queue.cancel();
                link.writer.send_now(&Message::quit(reason).to_string()).await
            }
            None => Ok(()),
        };
        info!(reason = reason.unwrap_or_default(), "Quitting");
        let _ = self.inner.shutdown.send(());
        result
    }

    async fn open(&self, host: &str, port: u16, tls: bool) -> EngineResult<(Session, BoxedStream)> {
        let mut session = Session::new(&self.inner.config, Instant::now());
        session.transition(ConnectionState::Connecting)?;
        self.publish(&session);
        info!(server = %host, port, tls, "Connecting");

        match self.inner.connector.connect(host, port, tls).await {
            Ok(stream) => Ok((session, stream)),
            Err(e) => {
                session.closed();
                self.publish(&session);
                Err(e)
            }
        }
    }

    async fn supervise(
        self,
        mut session: Session,
        mut stream: BoxedStream,
        host: String,
        port: u16,
        tls: bool,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut backoff = Backoff::new(&self.inner.config.reconnect);

        'session: loop {
            let outcome = event_loop::run(&self, session, stream, &host, port, &mut shutdown).await;
            if outcome.registered {
                backoff.reset();
            }
            let mut reason = outcome.error.as_ref().map(ToString::to_string);
            let mut retry = outcome.error.as_ref().is_some_and(|e| self.should_reconnect(e));

            loop {
                let delay = if retry { backoff.next_delay() } else { None };
                self.dispatch(Event::Disconnected {
                    reason: reason.take(),
                    reconnecting: delay.is_some(),
                })
                .await;
                let Some(delay) = delay else {
                    break 'session;
                };

                warn!(attempt = backoff.attempts(), delay_ms = delay.as_millis() as u64, "Reconnecting");
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break 'session,
                    _ = tokio::time::sleep(delay) => {}
                }
                if self.inner.quitting.load(Ordering::SeqCst) {
                    break 'session;
                }

                match self.open(&host, port, tls).await {
                    Ok((next_session, next_stream)) => {
                        session = next_session;
                        stream = next_stream;
                        continue 'session;
                    }
                    Err(e) => {
                        warn!(error = %e, "Reconnect attempt failed");
                        retry = self.should_reconnect(&e);
                        reason = Some(e.to_string());
                    }
                }
            }
        }

        info!("Session ended");
        self.inner.running.send_replace(false);
    }

    fn should_reconnect(&self, err: &EngineError) -> bool {
        self.inner.config.reconnect.enabled
            && !self.inner.quitting.load(Ordering::SeqCst)
            && err.is_reconnectable()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Queue a raw protocol line (without CRLF).
    pub fn send_raw(&self, line: &str) -> EngineResult<()> {
        if line.contains(['\r', '\n']) {
            return Err(EngineError::InvalidLine);
        }
        let link = self.link()?;
        let state = self.state();
        if !state.is_registered() && !self.inner.config.behavior.queue_before_registration {
            return Err(EngineError::NotRegistered);
        }
        link.queue.enqueue(line.to_owned())
    }

    /// Queue a message.
    pub fn send(&self, msg: &Message) -> EngineResult<()> {
        self.send_raw(&msg.to_string())
    }

    pub fn join(&self, channel: &str) -> EngineResult<()> {
        self.join_with_key(channel, None)
    }

    /// JOIN, unless we are already on `channel`.
    pub fn join_with_key(&self, channel: &str, key: Option<&str>) -> EngineResult<()> {
        {
            let state = self.inner.state.read();
            if !state.is_channel_name(channel) {
                return Err(EngineError::InvalidChannel(channel.to_owned()));
            }
            if state.channel(channel).is_some() {
                return Ok(());
            }
        }
        self.send(&Message::join(channel, key))
    }

    pub fn part(&self, channel: &str, reason: Option<&str>) -> EngineResult<()> {
        if self.inner.state.read().channel(channel).is_none() {
            return Err(EngineError::NotOnChannel(channel.to_owned()));
        }
        self.send(&Message::part(channel, reason))
    }

    /// PRIVMSG, split into as many lines as the server's line length needs.
    pub fn privmsg(&self, target: &str, text: &str) -> EngineResult<()> {
        let budget = self.payload_budget("PRIVMSG", target);
        for chunk in split_text(text, budget) {
            self.send(&Message::privmsg(target, chunk))?;
        }
        Ok(())
    }

    /// NOTICE, split like [`privmsg`](Self::privmsg).
    pub fn notice(&self, target: &str, text: &str) -> EngineResult<()> {
        let budget = self.payload_budget("NOTICE", target);
        for chunk in split_text(text, budget) {
            self.send(&Message::notice(target, chunk))?;
        }
        Ok(())
    }

    /// CTCP ACTION (`/me`).
    pub fn action(&self, target: &str, text: &str) -> EngineResult<()> {
        let framing = Ctcp::action("").to_string().len();
        let budget = self.payload_budget("PRIVMSG", target).saturating_sub(framing);
        for chunk in split_text(text, budget) {
            self.send(&Message::privmsg(target, &Ctcp::action(chunk).to_string()))?;
        }
        Ok(())
    }

    /// Request a nickname change. The tracked nickname changes once the
    /// server confirms it.
    pub fn set_nick(&self, nickname: &str) -> EngineResult<()> {
        self.send(&Message::nick(nickname))
    }

    fn payload_budget(&self, command: &str, target: &str) -> usize {
        let linelen = self.inner.state.read().isupport().linelen();
        // "CMD target :text\r\n"
        let overhead = command.len() + 1 + target.len() + 2 + 2;
        linelen.saturating_sub(overhead + RELAY_PREFIX_RESERVE).max(1)
    }

    fn link(&self) -> EngineResult<Link> {
        self.inner.link.lock().clone().ok_or(EngineError::NotConnected)
    }

    // ========================================================================
    // State queries
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        *self.inner.status.borrow()
    }

    /// Our current nickname (the attempted one while registering).
    pub fn nickname(&self) -> String {
        self.inner.nickname.read().clone()
    }

    pub fn get_channel(&self, name: &str) -> Option<Channel> {
        self.inner.state.read().channel(name).cloned()
    }

    pub fn get_user(&self, nick: &str) -> Option<User> {
        self.inner.state.read().user(nick).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.inner.state.read().channels().cloned().collect()
    }

    pub fn server_info(&self) -> ServerInfo {
        self.inner.state.read().server_info().clone()
    }

    pub fn isupport(&self) -> Isupport {
        self.inner.state.read().isupport().clone()
    }

    /// Run `f` against the tracked state without cloning it.
    ///
    /// The read lock is held while `f` runs, which blocks the reader loop;
    /// keep `f` short and never await inside it.
    pub fn with_state<R>(&self, f: impl FnOnce(&ProtocolState) -> R) -> R {
        f(&self.inner.state.read())
    }

    // ========================================================================
    // Reader loop plumbing
    // ========================================================================

    pub(crate) async fn dispatch(&self, event: Event) {
        self.inner.dispatcher.dispatch(self, event).await;
    }

    /// Mirror the session's state and nickname into the shared handle.
    pub(crate) fn publish(&self, session: &Session) {
        let state = session.state();
        self.inner.status.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        let mut nickname = self.inner.nickname.write();
        if *nickname != session.nickname() {
            *nickname = session.nickname().to_owned();
        }
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status.subscribe()
    }

    pub(crate) fn state_mut(&self) -> RwLockWriteGuard<'_, ProtocolState> {
        self.inner.state.write()
    }

    pub(crate) fn reset_state(&self) {
        self.inner.state.write().clear();
    }

    pub(crate) fn attach(&self, link: Link) {
        // A quit that raced the handshake already took the old link.
        if !self.inner.quitting.load(Ordering::SeqCst) {
            *self.inner.link.lock() = Some(link);
        }
    }

    /// `quit` was called for the current session.
    pub(crate) fn is_quitting(&self) -> bool {
        self.inner.quitting.load(Ordering::SeqCst)
    }

    pub(crate) fn detach(&self) {
        self.inner.link.lock().take();
    }
}

/// Split `text` into lines of at most `max_bytes` bytes, cutting on
/// character boundaries. Embedded line breaks start a new line; empty lines
/// are skipped.
fn split_text(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    for line in text.split(['\r', '\n']).filter(|line| !line.is_empty()) {
        let mut rest = line;
        while rest.len() > max_bytes {
            let mut cut = max_bytes;
            while cut > 0 && !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
            }
            let (head, tail) = rest.split_at(cut);
            chunks.push(head);
            rest = tail;
        }
        chunks.push(rest);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_text_untouched() {
        assert_eq!(split_text("hello", 10), vec!["hello"]);
    }

    #[test]
    fn test_split_on_byte_budget() {
        assert_eq!(split_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        // 'é' is two bytes
        let chunks = split_text("éééé", 3);
        assert_eq!(chunks, vec!["é", "é", "é", "é"]);
        assert!(chunks.iter().all(|c| c.len() <= 3));
    }

    #[test]
    fn test_split_on_newlines() {
        assert_eq!(split_text("one\r\ntwo\n\nthree", 100), vec!["one", "two", "three"]);
        assert!(split_text("", 10).is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config::new("", "bob");
        assert!(matches!(Client::new(config), Err(EngineError::Config(ConfigError::Invalid(_)))));
    }

    #[tokio::test]
    async fn test_commands_need_a_connection() {
        let client = Client::new(Config::new("irc.example.net", "bob")).unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.nickname(), "bob");
        assert!(matches!(client.send_raw("PING :x"), Err(EngineError::NotConnected)));
        assert!(matches!(client.send_raw("PING :x\r\nQUIT"), Err(EngineError::InvalidLine)));
        assert!(matches!(client.join("nochan"), Err(EngineError::InvalidChannel(_))));
        assert!(matches!(client.part("#rust", None), Err(EngineError::NotOnChannel(_))));
        assert!(matches!(client.quit(None).await, Err(EngineError::NotConnected)));
    }
}
