//! Built-in handlers installed on every client.
//!
//! - CTCP VERSION, PING, TIME and CLIENTINFO requests are answered by NOTICE.
//! - After registration: identify to NickServ, then join the autojoin list.

use std::sync::Arc;

use anyhow::Context as _;
use slirc_proto::{Ctcp, CtcpKind, Message};
use tracing::debug;

use crate::client::Client;
use crate::event::{Event, EventKind};

const CLIENTINFO: &str = "ACTION CLIENTINFO PING TIME VERSION";

pub(crate) fn install(client: &Client) {
    client.on(EventKind::CtcpRequest, answer_ctcp);
    client.on(EventKind::Registered, after_registration);
}

async fn answer_ctcp(client: Client, event: Arc<Event>) -> anyhow::Result<()> {
    let Event::CtcpRequest {
        source,
        command,
        params,
        ..
    } = &*event
    else {
        return Ok(());
    };
    if source.is_empty() {
        return Ok(());
    }

    let reply = match command {
        CtcpKind::Version => Some(client.config().behavior.ctcp_version.clone()),
        CtcpKind::Ping => params.clone(),
        CtcpKind::Time => Some(chrono::Local::now().to_rfc2822()),
        CtcpKind::Clientinfo => Some(CLIENTINFO.to_owned()),
        _ => return Ok(()),
    };
    debug!(from = %source, ctcp = %command, "Answering CTCP");
    let body = Ctcp::new(command.clone(), reply.as_deref()).to_string();
    client
        .send(&Message::notice(source, &body))
        .with_context(|| format!("CTCP {} reply to {}", command, source))
}

async fn after_registration(client: Client, _event: Arc<Event>) -> anyhow::Result<()> {
    let behavior = &client.config().behavior;
    if let Some(password) = &behavior.nickserv_password {
        client
            .privmsg("NickServ", &format!("IDENTIFY {}", password))
            .context("NickServ identify")?;
    }
    for entry in &behavior.autojoin {
        client
            .join_with_key(&entry.channel, entry.key.as_deref())
            .with_context(|| format!("autojoin {}", entry.channel))?;
    }
    Ok(())
}
