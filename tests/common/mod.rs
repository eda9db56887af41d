//! Integration test common infrastructure.
//!
//! Provides an in-memory connector that hands the server end of each
//! connection to the test, a scripted fake server, and helpers for
//! collecting the events a client dispatches.

pub mod connector;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use slirc_client::{Client, Config, Event, EventKind};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[allow(unused_imports)]
pub use connector::MockConnector;
#[allow(unused_imports)]
pub use server::FakeServer;

/// Route engine logs through the test harness. `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Config for `irc.test` with quick, deterministic settings.
pub fn test_config(nick: &str) -> Config {
    let mut config = Config::new("irc.test", nick);
    config.timing.rate_limit_interval_ms = 0;
    config.reconnect.backoff_ms = vec![1_000, 2_000];
    config
}

/// A client wired to a [`MockConnector`].
pub struct Harness {
    pub client: Client,
    pub connector: Arc<MockConnector>,
    pub servers: mpsc::UnboundedReceiver<FakeServer>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        init_tracing();
        let (connector, servers) = MockConnector::new();
        let client = Client::with_connector(config, connector.clone()).expect("valid config");
        Self {
            client,
            connector,
            servers,
        }
    }

    /// Next server-side connection opened by the client.
    pub async fn accept(&mut self) -> FakeServer {
        tokio::time::timeout(Duration::from_secs(600), self.servers.recv())
            .await
            .expect("client never connected")
            .expect("connector dropped")
    }

    /// Connect and complete registration as `nick`.
    #[allow(dead_code)]
    pub async fn registered(&mut self, nick: &str) -> FakeServer {
        self.client.connect().await.expect("connect");
        let mut server = self.accept().await;
        server.register(nick).await;
        server
    }
}

/// Forward every event of the given kinds into a channel, in dispatch order.
pub fn record(client: &Client, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<Arc<Event>> {
    let (tx, rx) = mpsc::unbounded_channel();
    for &kind in kinds {
        let tx = tx.clone();
        client.on(kind, move |_client, event| {
            let _ = tx.send(event);
            async { anyhow::Ok(()) }
        });
    }
    rx
}

/// Next recorded event, failing the test after a generous wait.
#[allow(dead_code)]
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Arc<Event>>) -> Arc<Event> {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("no event arrived")
        .expect("event channel closed")
}
