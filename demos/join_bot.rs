//! Minimal bot: joins the configured channels, answers `!ping`, and logs
//! channel traffic.
//!
//! ```text
//! cargo run --example join_bot -- bot.toml
//! RUST_LOG=slirc_client=debug cargo run --example join_bot -- bot.toml
//! ```

use slirc_client::{Client, Config, Event, EventKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bot.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(path = %config_path, server = %config.server.host, "Loaded configuration");

    let client = Client::new(config)?;

    client.on(EventKind::Registered, |client, _| async move {
        info!(nick = %client.nickname(), "Ready");
        anyhow::Ok(())
    });

    client.on(EventKind::Message, |client, event| async move {
        if let Event::Message { source, target, text, is_channel: true, .. } = &*event {
            info!(channel = %target, from = %source, "{}", text);
            if text.trim() == "!ping" {
                client.privmsg(target, &format!("{}: pong", source))?;
            }
        }
        anyhow::Ok(())
    });

    client.on(EventKind::Error, |_, event| async move {
        if let Event::Error { code, message } = &*event {
            error!(code, "{}", message);
        }
        anyhow::Ok(())
    });

    let shutdown = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, quitting");
            if let Err(e) = shutdown.quit(Some("Interrupted")).await {
                error!(error = %e, "Quit failed");
            }
        }
    });

    client.run().await?;
    info!("Bye");
    Ok(())
}
