//! Scripted server end of an in-memory connection.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec};

/// The server side of one client connection.
pub struct FakeServer {
    lines: FramedRead<ReadHalf<DuplexStream>, LinesCodec>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    pub fn new(stream: DuplexStream) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            lines: FramedRead::new(read_half, LinesCodec::new()),
            writer,
        }
    }

    /// Send one line; CRLF is appended.
    pub async fn send(&mut self, line: &str) {
        self.send_bytes(format!("{}\r\n", line).as_bytes()).await;
    }

    /// Send raw bytes as-is.
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("client hung up");
        self.writer.flush().await.expect("client hung up");
    }

    /// Next line from the client, without its terminator.
    pub async fn recv(&mut self) -> String {
        self.recv_within(Duration::from_secs(600))
            .await
            .expect("client sent nothing")
    }

    /// Next line from the client, or `None` if nothing arrives within `dur`.
    pub async fn recv_within(&mut self, dur: Duration) -> Option<String> {
        match timeout(dur, self.lines.next()).await {
            Ok(Some(Ok(line))) => Some(line.trim_end_matches('\r').to_owned()),
            Ok(Some(Err(e))) => panic!("read error: {}", e),
            Ok(None) => None,
            Err(_) => None,
        }
    }

    /// Skip lines until one satisfies `predicate`, returning it.
    #[allow(dead_code)]
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        loop {
            let line = self.recv().await;
            if predicate(&line) {
                return line;
            }
        }
    }

    /// Consume NICK and USER, then welcome the client as `nick`.
    pub async fn register(&mut self, nick: &str) {
        let first = self.recv().await;
        assert!(first.starts_with("NICK "), "expected NICK, got {}", first);
        let second = self.recv().await;
        assert!(second.starts_with("USER "), "expected USER, got {}", second);
        self.send(&format!(":irc.test 001 {} :Welcome to the test network", nick))
            .await;
    }

    /// Every line the client sends until it closes its end.
    #[allow(dead_code)]
    pub async fn remaining(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.recv_within(Duration::from_secs(600)).await {
            lines.push(line);
        }
        lines
    }

    /// Wait for the client to close its end.
    #[allow(dead_code)]
    pub async fn closed(&mut self) -> bool {
        loop {
            match timeout(Duration::from_secs(600), self.lines.next()).await {
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(_))) | Ok(None) => return true,
                Err(_) => return false,
            }
        }
    }
}
