//! In-memory transport.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::Mutex;
use slirc_client::connection::BoxedStream;
use slirc_client::{Connector, EngineError, EngineResult};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::server::FakeServer;

/// Every chunk the client wrote, with the time of the write call.
pub type WriteLog = Arc<Mutex<Vec<(Instant, String)>>>;

/// Connector backed by `tokio::io::duplex`.
pub struct MockConnector {
    servers: mpsc::UnboundedSender<FakeServer>,
    refusals: AtomicU32,
    attempts: AtomicU32,
    writes: WriteLog,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            servers,
            refusals: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            writes: WriteLog::default(),
        });
        (connector, rx)
    }

    /// Refuse the next `count` connection attempts.
    #[allow(dead_code)]
    pub fn refuse_next(&self, count: u32) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Lines the client wrote whose text starts with `command`.
    #[allow(dead_code)]
    pub fn writes_of(&self, command: &str) -> Vec<(Instant, String)> {
        self.writes
            .lock()
            .iter()
            .flat_map(|(at, chunk)| chunk.lines().map(move |line| (*at, line.trim_end().to_owned())))
            .filter(|(_, line)| line.starts_with(command))
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _host: &str, _port: u16, _tls: bool) -> EngineResult<BoxedStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(EngineError::Transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        self.servers
            .send(FakeServer::new(theirs))
            .map_err(|_| EngineError::NotConnected)?;
        Ok(Box::new(RecordingStream {
            inner: ours,
            writes: Arc::clone(&self.writes),
        }))
    }
}

/// Client end of the duplex pipe, logging writes.
struct RecordingStream {
    inner: DuplexStream,
    writes: WriteLog,
}

impl AsyncRead for RecordingStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RecordingStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            let chunk = String::from_utf8_lossy(&buf[..*n]).into_owned();
            this.writes.lock().push((Instant::now(), chunk));
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
