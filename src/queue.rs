//! Outgoing line queue and the shared socket writer.
//!
//! Application traffic goes through an unbounded queue drained by one sender
//! task per connection. The sender holds lines until registration completes
//! and spaces consecutive writes by the configured minimum interval.
//! Protocol traffic (registration, PONG, keepalive PING, QUIT) bypasses the
//! queue and goes straight to [`SharedWriter`]. Cancelling the queue drops
//! whatever is still pending; no queued line is written after that.

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use slirc_proto::{LineCodec, ProtocolError};
use tokio::io::WriteHalf;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::connection::{BoxedStream, ConnectionState};
use crate::error::{EngineError, EngineResult};

type Writer = FramedWrite<WriteHalf<BoxedStream>, LineCodec>;

/// Write side of the transport, shared by the sender task and the reader
/// loop. The mutex keeps whole lines from interleaving.
#[derive(Clone)]
pub(crate) struct SharedWriter {
    inner: Arc<Mutex<Writer>>,
}

impl SharedWriter {
    pub(crate) fn new(write_half: WriteHalf<BoxedStream>, max_len: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FramedWrite::new(write_half, LineCodec::with_max_len(max_len)))),
        }
    }

    /// Write and flush one line immediately.
    pub(crate) async fn send_now(&self, line: &str) -> EngineResult<()> {
        trace!(line = %line, "-> send");
        self.inner.lock().await.send(line).await.map_err(write_error)
    }

    /// Write a queued line unless `cancel` fired first. Returns whether the
    /// line went out.
    async fn send_queued(&self, line: &str, cancel: &CancellationToken) -> EngineResult<bool> {
        let mut writer = self.inner.lock().await;
        if cancel.is_cancelled() {
            return Ok(false);
        }
        trace!(line = %line, "-> send");
        writer.send(line).await.map_err(write_error)?;
        Ok(true)
    }

    /// Flush and shut down the write half. Errors are irrelevant by now.
    pub(crate) async fn close(&self) {
        let mut writer = self.inner.lock().await;
        if let Err(e) = SinkExt::<&str>::close(&mut *writer).await {
            debug!(error = %e, "Error closing writer");
        }
    }
}

fn write_error(err: ProtocolError) -> EngineError {
    match err {
        ProtocolError::Io(e) => EngineError::Transport(e),
        ProtocolError::EmbeddedTerminator => EngineError::InvalidLine,
        other => EngineError::Protocol(other),
    }
}

/// Producer end of a connection's outgoing queue.
#[derive(Clone)]
pub(crate) struct OutgoingQueue {
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl OutgoingQueue {
    /// Create the queue and spawn its sender task.
    ///
    /// The task ends when every producer is dropped, the queue is cancelled,
    /// the writer fails, or the returned handle is aborted. Lines still
    /// queued at that point are discarded.
    pub(crate) fn spawn(
        writer: SharedWriter,
        min_interval: Duration,
        state: watch::Receiver<ConnectionState>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sender(rx, writer, min_interval, state, cancel.clone()));
        (Self { tx, cancel }, handle)
    }

    pub(crate) fn enqueue(&self, line: String) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::NotConnected);
        }
        self.tx.send(line).map_err(|_| EngineError::NotConnected)
    }

    /// Drop every pending line and stop the sender.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

async fn run_sender(
    mut rx: mpsc::UnboundedReceiver<String>,
    writer: SharedWriter,
    min_interval: Duration,
    mut state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        registered = state.wait_for(|s| s.is_registered()) => {
            if registered.is_err() {
                return;
            }
        }
    }
    debug!(interval_ms = min_interval.as_millis() as u64, "Outgoing queue open");

    let mut next_slot = Instant::now();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(next_slot) => {}
        }
        match writer.send_queued(&line, &cancel).await {
            Ok(true) => next_slot = Instant::now() + min_interval,
            Ok(false) => break,
            Err(e) => {
                debug!(error = %e, "Outgoing queue stopped");
                return;
            }
        }
    }
    debug!("Outgoing queue closed");
}
