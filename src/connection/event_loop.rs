//! Per-connection reader loop.
//!
//! ```text
//!   socket ──► FramedRead<LineCodec> ──► parse ──► ProtocolState::apply
//!                                                        │
//!                                                        ▼
//!                         SharedWriter ◄── Session::on_message (PONG, NICK retry)
//!                                                        │
//!                                                        ▼
//!                                  dispatch: typed events, Registered, Raw
//! ```
//!
//! One message is fully processed (state applied, protocol replies written,
//! every handler run) before the next line is read. The loop also wakes at
//! the session's next deadline to run its timers.

use std::io;

use futures_util::StreamExt;
use slirc_proto::{LineCodec, Message, ProtocolError};
use tokio::io::ReadHalf;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, instrument, trace, warn};

use super::machine::{Session, SessionAction};
use super::transport::BoxedStream;
use crate::client::{Client, Link};
use crate::error::{EngineError, EngineResult};
use crate::event::Event;
use crate::queue::{OutgoingQueue, SharedWriter};

type LineReader = FramedRead<ReadHalf<BoxedStream>, LineCodec>;

/// How a connection ended.
pub(crate) struct Outcome {
    /// Registration completed at some point.
    pub registered: bool,
    /// `None` when the connection was closed on request.
    pub error: Option<EngineError>,
}

/// Why the loop woke up.
enum Wake {
    Line(String),
    Timer,
    Failed(EngineError),
    Eof,
}

/// Drive one established transport until it closes.
///
/// `session` must be in `Connecting`. On return the session is
/// `Disconnected`, protocol state is cleared and the outgoing queue is gone.
#[instrument(skip_all, fields(server = %host, port))]
pub(crate) async fn run(
    client: &Client,
    session: Session,
    stream: BoxedStream,
    host: &str,
    port: u16,
    shutdown: &mut broadcast::Receiver<()>,
) -> Outcome {
    let config = client.config();
    let max_line_len = config.limits.max_line_len;
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, LineCodec::with_max_len(max_line_len));
    let writer = SharedWriter::new(write_half, max_line_len);
    let (queue, sender) = OutgoingQueue::spawn(
        writer.clone(),
        config.timing.rate_limit_interval(),
        client.subscribe_state(),
    );
    client.attach(Link {
        queue,
        writer: writer.clone(),
    });

    let mut conn = Connection {
        client,
        session,
        writer: writer.clone(),
        max_line_len,
        registered: false,
    };
    let error = match conn.handshake(host, port).await {
        Ok(()) => conn.read_loop(&mut reader, shutdown).await,
        Err(e) => conn.fail(e).await,
    };

    sender.abort();
    client.detach();
    writer.close().await;
    conn.session.closed();
    client.reset_state();
    client.publish(&conn.session);
    debug!(registered = conn.registered, "Connection closed");

    Outcome {
        registered: conn.registered,
        error,
    }
}

struct Connection<'a> {
    client: &'a Client,
    session: Session,
    writer: SharedWriter,
    max_line_len: usize,
    registered: bool,
}

impl Connection<'_> {
    async fn handshake(&mut self, host: &str, port: u16) -> EngineResult<()> {
        let lines = self.session.transport_established(Instant::now())?;
        self.client.publish(&self.session);
        for msg in &lines {
            self.writer.send_now(&msg.to_string()).await?;
        }
        info!(nick = %self.session.nickname(), "Transport up, registering");
        self.client
            .dispatch(Event::Connected {
                host: host.to_owned(),
                port,
            })
            .await;
        Ok(())
    }

    /// Returns the error that ended the connection, or `None` on shutdown.
    async fn read_loop(
        &mut self,
        reader: &mut LineReader,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Option<EngineError> {
        loop {
            let deadline = self.session.next_deadline();
            let wake = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!("Shutdown requested");
                    self.session.begin_disconnect();
                    self.client.publish(&self.session);
                    return None;
                }
                wake = next_wake(reader, deadline) => wake,
            };

            let result = match wake {
                Wake::Line(line) => match self.process_line(reader, line).await {
                    Ok(()) => self.run_timers().await,
                    Err(e) => Err(e),
                },
                Wake::Timer => self.run_timers().await,
                Wake::Failed(e) => Err(e),
                Wake::Eof => Err(EngineError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                ))),
            };
            if let Err(e) = result {
                if self.client.is_quitting() && matches!(e, EngineError::Transport(_)) {
                    debug!(error = %e, "Transport closed after QUIT");
                    self.session.begin_disconnect();
                    self.client.publish(&self.session);
                    return None;
                }
                return self.fail(e).await;
            }
        }
    }

    async fn process_line(&mut self, reader: &mut LineReader, line: String) -> EngineResult<()> {
        let now = Instant::now();
        trace!(line = %line, "<- recv");

        let msg = match Message::parse(&line) {
            Ok(msg) => msg,
            Err(cause) => {
                self.session.note_activity(now);
                let err = EngineError::Parse { line, cause };
                warn!(error = %err, "Dropping unparseable line");
                self.report(&err).await;
                return Ok(());
            }
        };

        let own_nick = self.session.nickname().to_owned();
        let (mut events, casemapping, linelen) = {
            let mut state = self.client.state_mut();
            let events = state.apply(&msg, &own_nick);
            (events, state.casemapping(), state.isupport().linelen())
        };
        self.session.set_casemapping(casemapping);
        reader.decoder_mut().set_max_len(linelen.max(self.max_line_len));

        let actions = self.session.on_message(&msg, now);
        let outcome = self.perform(actions, &mut events).await;

        for event in events {
            self.client.dispatch(event).await;
        }
        self.client.dispatch(Event::Raw(msg)).await;
        outcome
    }

    /// Deadlines are checked after every line as well as on timer wakeups,
    /// so a steady stream of input cannot hold them off.
    async fn run_timers(&mut self) -> EngineResult<()> {
        let actions = self.session.poll_timers(Instant::now());
        let mut events = Vec::new();
        self.perform(actions, &mut events).await
    }

    /// Carry out session actions. Registration becomes an event appended to
    /// `events`; a fatal action is returned as the error.
    async fn perform(&mut self, actions: Vec<SessionAction>, events: &mut Vec<Event>) -> EngineResult<()> {
        let mut fatal = None;
        for action in actions {
            match action {
                SessionAction::Send(msg) => self.writer.send_now(&msg.to_string()).await?,
                SessionAction::Registered { nickname } => {
                    info!(nick = %nickname, "Registered");
                    self.registered = true;
                    events.push(Event::Registered { nickname });
                }
                SessionAction::Fatal(e) => fatal = Some(e),
            }
        }
        self.client.publish(&self.session);
        fatal.map_or(Ok(()), Err)
    }

    async fn fail(&mut self, err: EngineError) -> Option<EngineError> {
        self.session.begin_disconnect();
        self.client.publish(&self.session);
        if matches!(err, EngineError::Protocol(_)) {
            error!(error = %err, "Protocol violation, closing connection");
        } else {
            warn!(error = %err, code = err.error_code(), "Connection failed");
        }
        self.report(&err).await;
        Some(err)
    }

    async fn report(&self, err: &EngineError) {
        self.client
            .dispatch(Event::Error {
                code: err.error_code(),
                message: err.to_string(),
            })
            .await;
    }
}

/// Next line, or `Timer` once `deadline` passes. Cancel safe.
async fn next_wake(reader: &mut LineReader, deadline: Option<Instant>) -> Wake {
    let read = match deadline {
        Some(at) => match timeout_at(at, reader.next()).await {
            Ok(read) => read,
            Err(_) => return Wake::Timer,
        },
        None => reader.next().await,
    };
    match read {
        Some(Ok(line)) => Wake::Line(line),
        Some(Err(ProtocolError::Io(e))) => Wake::Failed(EngineError::Transport(e)),
        Some(Err(e)) => Wake::Failed(EngineError::Protocol(e)),
        None => Wake::Eof,
    }
}
