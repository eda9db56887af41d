//! Integration tests for the connection lifecycle: registration, keepalive,
//! timeouts, protocol violations, reconnection and quitting.

mod common;

use std::time::Duration;

use common::{Harness, next_event, record, test_config};
use slirc_client::{ConnectionState, EngineError, Event, EventKind};
use tokio::time::Instant;

fn disconnected(event: &Event) -> (Option<String>, bool) {
    match event {
        Event::Disconnected { reason, reconnecting } => (reason.clone(), *reconnecting),
        other => panic!("expected Disconnected, got {:?}", other),
    }
}

fn error_code(event: &Event) -> &'static str {
    match event {
        Event::Error { code, .. } => *code,
        other => panic!("expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_basic_registration() {
    let mut h = Harness::new(test_config("bob"));
    let mut events = record(&h.client, &[EventKind::Connect, EventKind::Registered]);

    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;
    assert_eq!(server.recv().await, "NICK bob");
    assert_eq!(server.recv().await, "USER bob 0 * :bob");
    assert_eq!(h.client.state(), ConnectionState::Registering);

    server.send(":irc.test 001 bob :Welcome to the test network bob!bob@127.0.0.1").await;

    match &*next_event(&mut events).await {
        Event::Connected { host, port } => {
            assert_eq!(host, "irc.test");
            assert_eq!(*port, 6667);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    match &*next_event(&mut events).await {
        Event::Registered { nickname } => assert_eq!(nickname, "bob"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(h.client.state(), ConnectionState::Registered);
    assert_eq!(h.client.nickname(), "bob");
    assert_eq!(
        h.client.get_user("bob").and_then(|u| u.hostmask()).as_deref(),
        Some("bob!bob@127.0.0.1")
    );

    // A repeated welcome does not register twice. The PONG proves the
    // welcome was fully processed.
    server.send(":irc.test 001 bob :Welcome again").await;
    server.send("PING :sync").await;
    assert_eq!(server.recv().await, "PONG :sync");
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_pong_is_immediate_even_while_registering() {
    let mut h = Harness::new(test_config("bob"));
    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;
    server.recv().await;
    server.recv().await;

    server.send("PING :irc.test").await;
    assert_eq!(server.recv().await, "PONG :irc.test");
    assert_eq!(h.client.state(), ConnectionState::Registering);
}

#[tokio::test]
async fn test_server_password_sent_first() {
    let mut config = test_config("bob");
    config.server.password = Some("hunter2".into());
    let mut h = Harness::new(config);
    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;

    assert_eq!(server.recv().await, "PASS hunter2");
    assert_eq!(server.recv().await, "NICK bob");
}

#[tokio::test]
async fn test_nick_collision_uses_alternates() {
    let mut config = test_config("bob");
    config.identity.alt_nicknames = vec!["bob2".into()];
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Registered]);

    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;
    assert_eq!(server.recv().await, "NICK bob");
    server.recv().await;

    server.send(":irc.test 433 * bob :Nickname is already in use").await;
    assert_eq!(server.recv().await, "NICK bob2");
    server.send(":irc.test 433 * bob2 :Nickname is already in use").await;
    assert_eq!(server.recv().await, "NICK bob2_");
    server.send(":irc.test 001 bob2_ :Welcome").await;

    match &*next_event(&mut events).await {
        Event::Registered { nickname } => assert_eq!(nickname, "bob2_"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(h.client.nickname(), "bob2_");
}

#[tokio::test]
async fn test_nick_collision_exhausted_ends_session() {
    let mut config = test_config("bob");
    config.identity.max_nick_attempts = 2;
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Error, EventKind::Disconnect]);

    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;
    server.recv().await;
    server.recv().await;
    for expected in ["NICK bob_", "NICK bob__"] {
        server.send(":irc.test 433 * * :Nickname is already in use").await;
        assert_eq!(server.recv().await, expected);
    }
    server.send(":irc.test 433 * * :Nickname is already in use").await;

    assert_eq!(error_code(&*next_event(&mut events).await), "nickname_collision");
    let (reason, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert!(reason.unwrap().contains("bob__"));
    assert!(!reconnecting);
    assert!(server.closed().await);
    h.client.wait_closed().await;
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert_eq!(h.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_registration_timeout() {
    let mut config = test_config("bob");
    config.reconnect.enabled = false;
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Error, EventKind::Disconnect]);

    let start = Instant::now();
    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;
    server.recv().await;
    server.recv().await;

    assert_eq!(error_code(&*next_event(&mut events).await), "registration_timeout");
    assert!(start.elapsed() >= Duration::from_secs(30));
    let (_, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert!(!reconnecting);
    assert!(server.closed().await);
}

#[tokio::test(start_paused = true)]
async fn test_registration_deadline_checked_between_lines() {
    let mut config = test_config("bob");
    config.reconnect.enabled = false;
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Error]);

    h.client.connect().await.expect("connect");
    let mut server = h.accept().await;
    server.recv().await;
    server.recv().await;

    // Both lines are already buffered when the deadline passes.
    server.send("PING :a").await;
    server.send("PING :b").await;
    tokio::time::advance(Duration::from_secs(31)).await;

    assert_eq!(server.recv().await, "PONG :a");
    assert_eq!(error_code(&*next_event(&mut events).await), "registration_timeout");
    assert_eq!(server.recv_within(Duration::from_secs(1)).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_ping_and_inactivity_timeout() {
    let mut config = test_config("bob");
    config.reconnect.enabled = false;
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Error]);
    let mut server = h.registered("bob").await;
    let registered_at = Instant::now();

    // Answered probes keep the connection alive.
    assert_eq!(server.recv().await, "PING :slirc-1");
    assert!(registered_at.elapsed() >= Duration::from_secs(60));
    server.send(":irc.test PONG irc.test :slirc-1").await;
    assert_eq!(server.recv().await, "PING :slirc-2");
    assert!(registered_at.elapsed() >= Duration::from_secs(120));
    assert_eq!(h.client.state(), ConnectionState::Registered);

    // An unanswered one does not.
    assert_eq!(error_code(&*next_event(&mut events).await), "connection_timeout");
    assert!(registered_at.elapsed() >= Duration::from_secs(180));
    assert!(server.closed().await);
}

#[tokio::test]
async fn test_oversized_line_is_a_protocol_violation() {
    let mut config = test_config("bob");
    config.reconnect.enabled = false;
    let mut h = Harness::new(config);
    let (tx, mut seen) = tokio::sync::mpsc::unbounded_channel();
    h.client.on(EventKind::Error, move |client, event| {
        let _ = tx.send((client.state(), event));
        async { anyhow::Ok(()) }
    });
    let mut server = h.registered("bob").await;

    let mut line = format!(":alice!a@h PRIVMSG #a :{}", "x".repeat(600));
    line.push_str("\r\n");
    server.send_bytes(line.as_bytes()).await;

    let (state, event) = seen.recv().await.expect("error event");
    assert_eq!(state, ConnectionState::Disconnecting);
    assert_eq!(error_code(&event), "protocol_violation");
    assert!(server.closed().await);
    h.client.wait_closed().await;
}

#[tokio::test]
async fn test_unparseable_line_is_reported_and_skipped() {
    let mut h = Harness::new(test_config("bob"));
    let mut events = record(&h.client, &[EventKind::Error]);
    let mut server = h.registered("bob").await;

    server.send(":only-a-prefix").await;
    server.send("PING :still-here").await;

    assert_eq!(error_code(&*next_event(&mut events).await), "parse_error");
    assert_eq!(server.recv().await, "PONG :still-here");
    assert_eq!(h.client.state(), ConnectionState::Registered);
}

#[tokio::test]
async fn test_server_error_closes_connection() {
    let mut config = test_config("bob");
    config.reconnect.enabled = false;
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Disconnect]);
    let mut server = h.registered("bob").await;

    server.send("ERROR :Closing Link: banned").await;
    let (reason, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert!(reason.unwrap().contains("banned"));
    assert!(!reconnecting);
    assert!(server.closed().await);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_transport_loss() {
    let mut h = Harness::new(test_config("bob"));
    let mut events = record(&h.client, &[EventKind::Registered, EventKind::Disconnect]);
    let server = h.registered("bob").await;
    assert!(matches!(&*next_event(&mut events).await, Event::Registered { .. }));

    let dropped_at = Instant::now();
    drop(server);
    let (reason, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert!(reason.is_some());
    assert!(reconnecting);
    assert!(h.client.get_user("bob").is_none());

    let mut server = h.accept().await;
    assert!(dropped_at.elapsed() >= Duration::from_secs(1));
    server.register("bob").await;
    assert!(matches!(&*next_event(&mut events).await, Event::Registered { .. }));
    assert_eq!(h.connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_gives_up_after_max_attempts() {
    let mut config = test_config("bob");
    config.reconnect.max_attempts = Some(2);
    let mut h = Harness::new(config);
    let mut events = record(&h.client, &[EventKind::Disconnect]);
    let server = h.registered("bob").await;

    h.connector.refuse_next(10);
    let dropped_at = Instant::now();
    drop(server);

    assert!(disconnected(&*next_event(&mut events).await).1);
    let (reason, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert!(reason.unwrap().contains("refused"));
    assert!(reconnecting);
    let (_, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert!(!reconnecting);

    h.client.wait_closed().await;
    // 1s then 2s from the schedule.
    assert!(dropped_at.elapsed() >= Duration::from_secs(3));
    assert_eq!(h.connector.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_quit_does_not_reconnect() {
    let mut h = Harness::new(test_config("bob"));
    let mut events = record(&h.client, &[EventKind::Disconnect]);
    let mut server = h.registered("bob").await;

    h.client.quit(Some("bye")).await.expect("quit");
    assert_eq!(server.recv().await, "QUIT :bye");
    assert!(server.closed().await);

    let (reason, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert_eq!(reason, None);
    assert!(!reconnecting);
    h.client.wait_closed().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.connector.attempts(), 1);
    assert_eq!(h.client.state(), ConnectionState::Disconnected);
    assert!(matches!(h.client.send_raw("PING :x"), Err(EngineError::NotConnected)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_hangup_after_quit_is_clean() {
    let mut h = Harness::new(test_config("bob"));
    let mut events = record(&h.client, &[EventKind::Error, EventKind::Disconnect]);
    let mut server = h.registered("bob").await;

    h.client.quit(Some("bye")).await.expect("quit");
    assert_eq!(server.recv().await, "QUIT :bye");
    drop(server);

    let (reason, reconnecting) = disconnected(&*next_event(&mut events).await);
    assert_eq!(reason, None);
    assert!(!reconnecting);
    h.client.wait_closed().await;
    assert_eq!(h.connector.attempts(), 1);
}

#[tokio::test]
async fn test_failed_connect_is_returned() {
    let h = Harness::new(test_config("bob"));
    h.connector.refuse_next(1);

    let err = h.client.connect().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport(_)));
    assert_eq!(h.client.state(), ConnectionState::Disconnected);

    // The client is reusable.
    h.client.connect().await.expect("second connect");
    assert!(matches!(h.client.connect().await, Err(EngineError::AlreadyConnected)));
}
