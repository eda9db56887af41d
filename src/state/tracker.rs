//! Derived protocol state.
//!
//! [`ProtocolState`] folds every inbound message into channel, user and
//! server bookkeeping and reports what changed as [`Event`]s. It is written
//! only by the connection's reader task; everyone else reads snapshots.

use std::collections::{BTreeSet, HashMap};
use std::mem;

use slirc_proto::mode::{parse_channel_modes, parse_user_modes};
use slirc_proto::{
    Casemapping, ChanModeKind, ChanModes, Command, Ctcp, Isupport, Message, ModeChange,
    PrefixSpec, Response,
};

use super::channel::{Channel, Membership};
use super::user::User;
use crate::event::Event;

/// What the server told us about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// From 004, or the 001 prefix until 004 arrives.
    pub server_name: Option<String>,
    pub version: Option<String>,
    /// Available user modes (004).
    pub user_modes: Option<String>,
    /// Available channel modes (004).
    pub channel_modes: Option<String>,
    /// 003 text.
    pub created: Option<String>,
    /// Complete MOTD; `Some(vec![])` when the server has none.
    pub motd: Option<Vec<String>>,
    /// Our own user modes.
    pub own_modes: BTreeSet<char>,
}

/// Channels, users and server info for one connection.
#[derive(Debug, Default)]
pub struct ProtocolState {
    channels: HashMap<String, Channel>,
    users: HashMap<String, User>,
    isupport: Isupport,
    server: ServerInfo,
    casemapping: Casemapping,
    /// Casefolded own nickname for the message being applied.
    own: String,
    motd_buf: Vec<String>,
    names_buf: HashMap<String, Vec<Membership>>,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self::default()
    }

    fn fold(&self, s: &str) -> String {
        self.casemapping.fold(s)
    }

    // ------------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------------

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.fold(name))
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get(&self.fold(nick))
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn isupport(&self) -> &Isupport {
        &self.isupport
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn casemapping(&self) -> Casemapping {
        self.casemapping
    }

    /// True if `name` is a channel under the server's CHANTYPES.
    pub fn is_channel_name(&self, name: &str) -> bool {
        self.isupport.is_channel_name(name)
    }

    /// Forget everything; the connection is gone.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ------------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------------

    /// Apply one inbound message. `own_nick` is our nickname before the
    /// message (a NICK of ours renames from it).
    pub fn apply(&mut self, msg: &Message, own_nick: &str) -> Vec<Event> {
        self.own = self.fold(own_nick);
        let mut events = Vec::new();

        match &msg.command {
            Command::Named(name) => match name.as_str() {
                "JOIN" => self.on_join(msg, &mut events),
                "PART" => self.on_part(msg, &mut events),
                "KICK" => self.on_kick(msg, &mut events),
                "QUIT" => self.on_quit(msg, &mut events),
                "NICK" => self.on_nick(msg, &mut events),
                "MODE" => self.on_mode(msg, &mut events),
                "TOPIC" => self.on_topic(msg, &mut events),
                "PRIVMSG" => self.on_text(msg, false, &mut events),
                "NOTICE" => self.on_text(msg, true, &mut events),
                _ => {}
            },
            Command::Numeric(_) => self.on_numeric(msg, own_nick, &mut events),
        }
        events
    }

    fn on_numeric(&mut self, msg: &Message, own_nick: &str, events: &mut Vec<Event>) {
        let Some(response) = msg.command.response() else {
            return;
        };
        match response {
            Response::RPL_WELCOME => self.on_welcome(msg),
            Response::RPL_CREATED => self.server.created = msg.last_arg().map(str::to_owned),
            Response::RPL_MYINFO => {
                if let Some(name) = msg.arg(1) {
                    self.server.server_name = Some(name.to_owned());
                }
                self.server.version = msg.arg(2).map(str::to_owned);
                self.server.user_modes = msg.arg(3).map(str::to_owned);
                self.server.channel_modes = msg.arg(4).map(str::to_owned);
            }
            Response::RPL_ISUPPORT => {
                self.isupport.apply_reply(msg);
                let casemapping = self.isupport.casemapping();
                if casemapping != self.casemapping {
                    self.casemapping = casemapping;
                    self.rekey();
                    self.own = self.fold(own_nick);
                }
            }
            Response::RPL_UMODEIS => {
                self.server.own_modes = parse_user_modes(msg.arg(1).unwrap_or_default())
                    .into_iter()
                    .filter(|c| c.adding)
                    .map(|c| c.mode)
                    .collect();
            }
            Response::RPL_MOTDSTART => self.motd_buf.clear(),
            Response::RPL_MOTD => {
                let line = msg.last_arg().unwrap_or_default();
                self.motd_buf
                    .push(line.strip_prefix("- ").unwrap_or(line).to_owned());
            }
            Response::RPL_ENDOFMOTD | Response::ERR_NOMOTD => {
                let lines = mem::take(&mut self.motd_buf);
                self.server.motd = Some(lines.clone());
                events.push(Event::Motd { lines });
            }
            Response::RPL_CHANNELMODEIS => self.on_channel_mode_is(msg),
            Response::RPL_NOTOPIC | Response::RPL_TOPIC => {
                let Some(channel) = msg.arg(1) else {
                    return;
                };
                let topic = if response == Response::RPL_TOPIC {
                    msg.arg(2).filter(|t| !t.is_empty()).map(str::to_owned)
                } else {
                    None
                };
                let chan = self.channel_entry(channel);
                chan.topic = topic.clone();
                events.push(Event::TopicChange {
                    channel: chan.name.clone(),
                    topic,
                    by: None,
                });
            }
            Response::RPL_NAMREPLY => self.on_names(msg),
            Response::RPL_ENDOFNAMES => self.on_end_of_names(msg, events),
            Response::RPL_WHOREPLY => {
                if let Some(nick) = msg.arg(5) {
                    let key = self.fold(nick);
                    if let Some(user) = self.users.get_mut(&key) {
                        user.learn(msg.arg(2), msg.arg(3));
                    }
                }
            }
            Response::RPL_VISIBLEHOST => {
                let own = self.own.clone();
                if let Some(user) = self.users.get_mut(&own) {
                    user.learn(None, msg.arg(1));
                }
            }
            _ => {}
        }
    }

    /// 001: the first parameter is our registered nick; the text often ends
    /// with our full `nick!user@host`.
    fn on_welcome(&mut self, msg: &Message) {
        if let Some(prefix) = &msg.prefix {
            self.server.server_name = Some(prefix.name().to_owned());
        }
        let Some(nick) = msg.arg(0) else {
            return;
        };
        self.own = self.fold(nick);
        let casemapping = self.casemapping;
        let user = self
            .users
            .entry(self.own.clone())
            .or_insert_with(|| User::new(nick, casemapping));
        user.nickname = nick.to_owned();

        let mask = msg
            .trailing
            .as_deref()
            .and_then(|text| text.split_whitespace().last())
            .filter(|word| word.contains('!') && word.contains('@'))
            .map(slirc_proto::Prefix::new_from_str);
        if let Some(mask) = mask
            && mask.nick().is_some_and(|n| casemapping.equals(n, nick))
        {
            user.learn(mask.user(), mask.host());
        }
    }

    fn on_join(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let (Some(prefix), Some(channel)) = (msg.prefix.as_ref(), msg.arg(0)) else {
            return;
        };
        let Some(nick) = prefix.nick() else {
            return;
        };
        let chan_key = self.fold(channel);
        let nick_key = self.fold(nick);
        let casemapping = self.casemapping;
        if nick_key != self.own && !self.channels.contains_key(&chan_key) {
            return;
        }

        let chan = self.channel_entry(channel);
        chan.members
            .entry(nick_key.clone())
            .or_insert_with(|| Membership::new(nick));
        let display = chan.name.clone();

        let user = self
            .users
            .entry(nick_key)
            .or_insert_with(|| User::new(nick, casemapping));
        user.learn(prefix.user(), prefix.host());
        user.channels.insert(chan_key.clone(), display.clone());

        events.push(Event::Join {
            channel: display,
            nick: nick.to_owned(),
        });
        self.push_members(&chan_key, events);
    }

    fn on_part(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let (Some(nick), Some(channel)) = (msg.source_nick(), msg.arg(0)) else {
            return;
        };
        let display = self.leave(channel, nick, events);
        // Members is pushed by `leave`; keep Part ahead of it.
        let part = Event::Part {
            channel: display,
            nick: nick.to_owned(),
            reason: msg.arg(1).map(str::to_owned),
        };
        insert_before_members(events, part);
    }

    fn on_kick(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let (Some(channel), Some(nick)) = (msg.arg(0), msg.arg(1)) else {
            return;
        };
        let by = msg.prefix.as_ref().map(|p| p.name().to_owned()).unwrap_or_default();
        let display = self.leave(channel, nick, events);
        let kick = Event::Kick {
            channel: display,
            nick: nick.to_owned(),
            by,
            reason: msg.arg(2).map(str::to_owned),
        };
        insert_before_members(events, kick);
    }

    fn on_quit(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let Some(nick) = msg.source_nick() else {
            return;
        };
        let nick_key = self.fold(nick);
        let shared: Vec<(String, String)> = self
            .users
            .get(&nick_key)
            .map(|u| u.channels.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        if nick_key == self.own {
            for (chan_key, _) in &shared {
                self.drop_channel(chan_key);
            }
        } else {
            for (chan_key, _) in &shared {
                if let Some(chan) = self.channels.get_mut(chan_key) {
                    chan.members.remove(&nick_key);
                }
            }
            self.users.remove(&nick_key);
        }

        events.push(Event::Quit {
            nick: nick.to_owned(),
            reason: msg.arg(0).map(str::to_owned),
            channels: shared.iter().map(|(_, display)| display.clone()).collect(),
        });
        for (chan_key, _) in &shared {
            self.push_members(chan_key, events);
        }
    }

    /// Rename in place: the user keeps its record and memberships.
    fn on_nick(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let (Some(old), Some(new)) = (msg.source_nick(), msg.arg(0)) else {
            return;
        };
        let old_key = self.fold(old);
        let new_key = self.fold(new);

        if let Some(mut user) = self.users.remove(&old_key) {
            user.nickname = new.to_owned();
            for chan_key in user.channels.keys() {
                let Some(chan) = self.channels.get_mut(chan_key) else {
                    continue;
                };
                if let Some(mut member) = chan.members.remove(&old_key) {
                    member.nick = new.to_owned();
                    chan.members.insert(new_key.clone(), member);
                }
            }
            self.users.insert(new_key.clone(), user);
        }
        if old_key == self.own {
            self.own = new_key;
        }

        events.push(Event::NickChange {
            old: old.to_owned(),
            new: new.to_owned(),
        });
    }

    fn on_mode(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let Some(target) = msg.arg(0) else {
            return;
        };
        let by = msg.prefix.as_ref().map(|p| p.name().to_owned()).unwrap_or_default();
        let modes = msg.arg(1).unwrap_or_default();

        if self.is_channel_name(target) {
            let prefix = self.isupport.prefix();
            let chanmodes = self.isupport.chanmodes();
            let changes = parse_channel_modes(modes, msg.args().skip(2), &prefix, &chanmodes);
            let chan = self.channel_entry(target);
            for change in &changes {
                apply_channel_mode(chan, change, &prefix, &chanmodes);
            }
            events.push(Event::ModeChange {
                target: chan.name.clone(),
                by,
                changes,
            });
        } else if self.fold(target) == self.own {
            let changes = parse_user_modes(modes);
            for change in &changes {
                if change.adding {
                    self.server.own_modes.insert(change.mode);
                } else {
                    self.server.own_modes.remove(&change.mode);
                }
            }
            events.push(Event::ModeChange {
                target: target.to_owned(),
                by,
                changes,
            });
        }
    }

    /// 324 replaces the channel's modes wholesale.
    fn on_channel_mode_is(&mut self, msg: &Message) {
        let Some(channel) = msg.arg(1) else {
            return;
        };
        let prefix = self.isupport.prefix();
        let chanmodes = self.isupport.chanmodes();
        let changes = parse_channel_modes(
            msg.arg(2).unwrap_or_default(),
            msg.args().skip(3),
            &prefix,
            &chanmodes,
        );
        let chan = self.channel_entry(channel);
        chan.modes.clear();
        for change in changes.iter().filter(|c| c.adding) {
            apply_channel_mode(chan, change, &prefix, &chanmodes);
        }
    }

    fn on_topic(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let Some(channel) = msg.arg(0) else {
            return;
        };
        let topic = msg.arg(1).filter(|t| !t.is_empty()).map(str::to_owned);
        let by = msg.prefix.as_ref().map(|p| p.name().to_owned());
        let chan = self.channel_entry(channel);
        chan.topic = topic.clone();
        events.push(Event::TopicChange {
            channel: chan.name.clone(),
            topic,
            by,
        });
    }

    /// PRIVMSG/NOTICE. Senders we share no channel with are not recorded.
    fn on_text(&mut self, msg: &Message, notice: bool, events: &mut Vec<Event>) {
        let (Some(target), Some(text)) = (msg.arg(0), msg.arg(1)) else {
            return;
        };
        let source = msg.prefix.as_ref().map(|p| p.name().to_owned()).unwrap_or_default();
        if let Some(prefix) = &msg.prefix
            && let Some(nick) = prefix.nick()
        {
            let key = self.fold(nick);
            if let Some(user) = self.users.get_mut(&key) {
                user.learn(prefix.user(), prefix.host());
            }
        }

        // STATUSMSG targets (`@#chan`) are still channel messages.
        let prefix = self.isupport.prefix();
        let is_channel = self.is_channel_name(target.trim_start_matches(|c: char| prefix.is_prefix_symbol(c)));
        let target = target.to_owned();

        let event = match Ctcp::parse(text) {
            Some(ctcp) if notice => Event::CtcpReply {
                source,
                target,
                command: ctcp.kind.clone(),
                params: ctcp.params.map(str::to_owned),
            },
            Some(ctcp) if ctcp.is_action() => Event::Message {
                source,
                target,
                text: ctcp.params.unwrap_or_default().to_owned(),
                is_channel,
                is_action: true,
            },
            Some(ctcp) => Event::CtcpRequest {
                source,
                target,
                command: ctcp.kind.clone(),
                params: ctcp.params.map(str::to_owned),
            },
            None if notice => Event::Notice {
                source,
                target,
                text: text.to_owned(),
                is_channel,
            },
            None => Event::Message {
                source,
                target,
                text: text.to_owned(),
                is_channel,
                is_action: false,
            },
        };
        events.push(event);
    }

    /// 353 entries accumulate until 366. Both the RFC 1459 form (no channel
    /// type symbol) and the RFC 2812 form are accepted.
    fn on_names(&mut self, msg: &Message) {
        let channel = if msg.arg_count() >= 4 { msg.arg(2) } else { msg.arg(1) };
        let (Some(channel), Some(names)) = (channel, msg.last_arg()) else {
            return;
        };
        let prefix = self.isupport.prefix();
        let key = self.fold(channel);
        let buf = self.names_buf.entry(key).or_default();
        for entry in names.split_whitespace() {
            let (modes, rest) = prefix.split_nick(entry);
            // userhost-in-names sends full masks.
            let nick = rest.split('!').next().unwrap_or(rest);
            if nick.is_empty() {
                continue;
            }
            let mut member = Membership::new(nick);
            member.modes.extend(modes);
            buf.push(member);
        }
    }

    /// 366 replaces the member list with what 353 delivered.
    fn on_end_of_names(&mut self, msg: &Message, events: &mut Vec<Event>) {
        let Some(channel) = msg.arg(1) else {
            return;
        };
        let chan_key = self.fold(channel);
        let Some(listed) = self.names_buf.remove(&chan_key) else {
            return;
        };
        let casemapping = self.casemapping;
        let Some(chan) = self.channels.get_mut(&chan_key) else {
            return;
        };

        let members: HashMap<String, Membership> = listed
            .into_iter()
            .map(|m| (casemapping.fold(&m.nick), m))
            .collect();
        let departed: Vec<String> = chan
            .members
            .keys()
            .filter(|key| !members.contains_key(*key))
            .cloned()
            .collect();
        let present: Vec<(String, String)> = members
            .iter()
            .map(|(key, m)| (key.clone(), m.nick.clone()))
            .collect();
        chan.members = members;
        let display = chan.name.clone();

        for (key, nick) in present {
            self.users
                .entry(key)
                .or_insert_with(|| User::new(&nick, casemapping))
                .channels
                .insert(chan_key.clone(), display.clone());
        }
        for key in departed {
            if let Some(user) = self.users.get_mut(&key) {
                user.channels.remove(&chan_key);
            }
            self.collect(&key);
        }
        self.push_members(&chan_key, events);
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn channel_entry(&mut self, name: &str) -> &mut Channel {
        let key = self.fold(name);
        let casemapping = self.casemapping;
        self.channels
            .entry(key)
            .or_insert_with(|| Channel::new(name, casemapping))
    }

    /// Remove `nick` from `channel`; if it is us, drop the channel. Returns
    /// the channel's display name.
    fn leave(&mut self, channel: &str, nick: &str, events: &mut Vec<Event>) -> String {
        let chan_key = self.fold(channel);
        let nick_key = self.fold(nick);
        let display = self
            .channels
            .get(&chan_key)
            .map_or_else(|| channel.to_owned(), |c| c.name.clone());

        if nick_key == self.own {
            self.drop_channel(&chan_key);
        } else if self.channels.contains_key(&chan_key) {
            if let Some(chan) = self.channels.get_mut(&chan_key) {
                chan.members.remove(&nick_key);
            }
            if let Some(user) = self.users.get_mut(&nick_key) {
                user.channels.remove(&chan_key);
            }
            self.collect(&nick_key);
            self.push_members(&chan_key, events);
        }
        display
    }

    fn drop_channel(&mut self, chan_key: &str) {
        let Some(chan) = self.channels.remove(chan_key) else {
            return;
        };
        self.names_buf.remove(chan_key);
        for nick_key in chan.members.keys() {
            if let Some(user) = self.users.get_mut(nick_key) {
                user.channels.remove(chan_key);
            }
            self.collect(nick_key);
        }
    }

    /// Forget a user that shares no channel with us. Our own record stays.
    fn collect(&mut self, nick_key: &str) {
        if nick_key != self.own
            && self.users.get(nick_key).is_some_and(|u| u.channels.is_empty())
        {
            self.users.remove(nick_key);
        }
    }

    fn push_members(&self, chan_key: &str, events: &mut Vec<Event>) {
        if let Some(chan) = self.channels.get(chan_key) {
            events.push(Event::Members {
                channel: chan.name.clone(),
                nicks: chan.nicks(),
            });
        }
    }

    /// Rebuild every key after the server announced a different CASEMAPPING.
    fn rekey(&mut self) {
        let casemapping = self.casemapping;
        self.channels = mem::take(&mut self.channels)
            .into_values()
            .map(|mut chan| {
                chan.casemapping = casemapping;
                chan.members = mem::take(&mut chan.members)
                    .into_values()
                    .map(|m| (casemapping.fold(&m.nick), m))
                    .collect();
                (casemapping.fold(&chan.name), chan)
            })
            .collect();
        self.users = mem::take(&mut self.users)
            .into_values()
            .map(|mut user| {
                user.casemapping = casemapping;
                user.channels = mem::take(&mut user.channels)
                    .into_values()
                    .map(|name| (casemapping.fold(&name), name))
                    .collect();
                (casemapping.fold(&user.nickname), user)
            })
            .collect();
        self.names_buf.clear();
    }
}

/// Apply one delta. Membership modes go to the member, list modes are not
/// stored, everything else lands in the channel's mode map.
fn apply_channel_mode(chan: &mut Channel, change: &ModeChange, prefix: &PrefixSpec, chanmodes: &ChanModes) {
    if prefix.is_prefix_mode(change.mode) {
        let Some(nick) = change.arg.as_deref() else {
            return;
        };
        let key = chan.casemapping.fold(nick);
        if let Some(member) = chan.members.get_mut(&key) {
            if change.adding {
                member.modes.insert(change.mode);
            } else {
                member.modes.remove(&change.mode);
            }
        }
        return;
    }
    if chanmodes.kind(change.mode) == Some(ChanModeKind::List) {
        return;
    }
    if change.adding {
        chan.modes.insert(change.mode, change.arg.clone());
    } else {
        chan.modes.remove(&change.mode);
    }
}

/// Place `event` ahead of any trailing `Members` events.
fn insert_before_members(events: &mut Vec<Event>, event: Event) {
    let at = events
        .iter()
        .position(|e| matches!(e, Event::Members { .. }))
        .unwrap_or(events.len());
    events.insert(at, event);
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: &str = "bob";

    fn feed(state: &mut ProtocolState, lines: &[&str]) -> Vec<Event> {
        let mut events = Vec::new();
        for line in lines {
            let msg = Message::parse(line).unwrap();
            events.extend(state.apply(&msg, ME));
        }
        events
    }

    fn joined() -> ProtocolState {
        let mut state = ProtocolState::new();
        feed(
            &mut state,
            &[
                ":irc.example.com 001 bob :Welcome to IRC bob!bobby@host.example",
                ":bob!bobby@host.example JOIN #test",
                ":irc.example.com 353 bob = #test :bob @alice +carol",
                ":irc.example.com 366 bob #test :End of /NAMES list.",
            ],
        );
        state
    }

    #[test]
    fn test_welcome_records_own_hostmask() {
        let state = joined();
        let me = state.user("bob").unwrap();
        assert_eq!(me.hostmask().as_deref(), Some("bob!bobby@host.example"));
        assert_eq!(state.server_info().server_name.as_deref(), Some("irc.example.com"));
    }

    #[test]
    fn test_names_populates_members() {
        let state = joined();
        let chan = state.channel("#TEST").unwrap();
        assert_eq!(chan.nicks(), vec!["alice", "bob", "carol"]);
        assert!(chan.member("alice").unwrap().has_mode('o'));
        assert!(chan.member("carol").unwrap().has_mode('v'));
        assert!(state.user("carol").unwrap().is_on("#test"));
    }

    #[test]
    fn test_duplicate_join_single_membership() {
        let mut state = joined();
        feed(
            &mut state,
            &[":dave!d@h JOIN #test", ":dave!d@h JOIN #test"],
        );
        let chan = state.channel("#test").unwrap();
        assert_eq!(chan.member_count(), 4);
        assert_eq!(state.user("dave").unwrap().channels().count(), 1);
    }

    #[test]
    fn test_join_part_converges_to_last_action() {
        let mut state = joined();
        feed(
            &mut state,
            &[
                ":dave!d@h JOIN #test",
                ":dave!d@h PART #test",
                ":dave!d@h JOIN #test",
            ],
        );
        assert!(state.channel("#test").unwrap().has_member("dave"));

        feed(&mut state, &[":dave!d@h PART #test :bye"]);
        assert!(!state.channel("#test").unwrap().has_member("dave"));
        assert!(state.user("dave").is_none());
    }

    #[test]
    fn test_nick_rename_preserves_membership() {
        let mut state = joined();
        let events = feed(&mut state, &[":alice!a@h NICK bob2"]);

        assert!(state.user("alice").is_none());
        let renamed = state.user("bob2").unwrap();
        assert!(renamed.is_on("#test"));
        let member = state.channel("#test").unwrap().member("bob2").unwrap();
        assert_eq!(member.nick, "bob2");
        assert!(member.has_mode('o'));
        assert!(matches!(&events[..], [Event::NickChange { old, new }] if old == "alice" && new == "bob2"));
    }

    #[test]
    fn test_own_part_destroys_channel_and_collects_users() {
        let mut state = joined();
        let events = feed(&mut state, &[":bob!bobby@host.example PART #test :later"]);

        assert!(state.channel("#test").is_none());
        assert!(state.user("alice").is_none());
        assert!(state.user("carol").is_none());
        assert!(state.user("bob").is_some());
        assert!(matches!(&events[..], [Event::Part { nick, reason: Some(r), .. }] if nick == "bob" && r == "later"));
    }

    #[test]
    fn test_kick_removes_member() {
        let mut state = joined();
        let events = feed(&mut state, &[":alice!a@h KICK #test carol :behave"]);

        assert!(!state.channel("#test").unwrap().has_member("carol"));
        assert!(state.user("carol").is_none());
        assert!(matches!(&events[0], Event::Kick { nick, by, .. } if nick == "carol" && by == "alice"));
        assert!(matches!(&events[1], Event::Members { nicks, .. } if nicks.len() == 2));
    }

    #[test]
    fn test_kick_of_self_drops_channel() {
        let mut state = joined();
        feed(&mut state, &[":alice!a@h KICK #test bob :out"]);
        assert!(state.channel("#test").is_none());
        assert_eq!(state.channels().count(), 0);
    }

    #[test]
    fn test_quit_collects_user_everywhere() {
        let mut state = joined();
        feed(
            &mut state,
            &[":bob!b@h JOIN #other", ":alice!a@h JOIN #other"],
        );
        let events = feed(&mut state, &[":alice!a@h QUIT :Ping timeout"]);

        assert!(state.user("alice").is_none());
        assert!(!state.channel("#test").unwrap().has_member("alice"));
        assert!(!state.channel("#other").unwrap().has_member("alice"));
        match &events[0] {
            Event::Quit { nick, reason, channels } => {
                assert_eq!(nick, "alice");
                assert_eq!(reason.as_deref(), Some("Ping timeout"));
                assert_eq!(channels.len(), 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_channel_modes_and_membership_modes() {
        let mut state = joined();
        let events = feed(
            &mut state,
            &[":alice!a@h MODE #test +ntk-o+bl secret alice *!*@spam 25"],
        );
        let chan = state.channel("#test").unwrap();
        assert!(chan.has_mode('n'));
        assert_eq!(chan.mode_arg('k'), Some("secret"));
        assert_eq!(chan.mode_arg('l'), Some("25"));
        assert!(!chan.has_mode('b'));
        assert!(!chan.member("alice").unwrap().has_mode('o'));
        assert!(matches!(&events[..], [Event::ModeChange { changes, .. }] if changes.len() == 6));

        feed(&mut state, &[":alice!a@h MODE #test -lk *"]);
        let chan = state.channel("#test").unwrap();
        assert!(!chan.has_mode('l'));
        assert!(!chan.has_mode('k'));
    }

    #[test]
    fn test_channel_mode_is_replaces() {
        let mut state = joined();
        feed(
            &mut state,
            &[
                ":alice!a@h MODE #test +m",
                ":irc.example.com 324 bob #test +ntl 10",
            ],
        );
        let chan = state.channel("#test").unwrap();
        assert!(!chan.has_mode('m'));
        assert_eq!(chan.mode_string(), "+lnt 10");
    }

    #[test]
    fn test_own_user_modes() {
        let mut state = joined();
        feed(&mut state, &[":bob MODE bob :+iw", ":bob MODE bob -w"]);
        assert_eq!(state.server_info().own_modes, BTreeSet::from(['i']));
    }

    #[test]
    fn test_topic_replies_and_changes() {
        let mut state = joined();
        feed(&mut state, &[":irc 332 bob #test :Rust talk"]);
        assert_eq!(state.channel("#test").unwrap().topic.as_deref(), Some("Rust talk"));

        let events = feed(&mut state, &[":alice!a@h TOPIC #test :"]);
        assert_eq!(state.channel("#test").unwrap().topic, None);
        assert!(matches!(&events[..], [Event::TopicChange { topic: None, by: Some(by), .. }] if by == "alice"));
    }

    #[test]
    fn test_privmsg_events_and_strangers() {
        let mut state = joined();
        let events = feed(
            &mut state,
            &[
                ":alice!a@alice.host PRIVMSG #test :hello",
                ":zed!z@elsewhere PRIVMSG bob :psst",
                ":alice!a@h PRIVMSG #test :\x01ACTION waves\x01",
                ":alice!a@h PRIVMSG bob :\x01VERSION\x01",
                ":alice!a@h NOTICE bob :\x01VERSION irssi\x01",
            ],
        );
        assert!(matches!(&events[0], Event::Message { is_channel: true, is_action: false, text, .. } if text == "hello"));
        assert!(matches!(&events[1], Event::Message { is_channel: false, source, .. } if source == "zed"));
        assert!(matches!(&events[2], Event::Message { is_action: true, text, .. } if text == "waves"));
        assert!(matches!(&events[3], Event::CtcpRequest { command: slirc_proto::CtcpKind::Version, .. }));
        assert!(matches!(&events[4], Event::CtcpReply { params: Some(p), .. } if p == "irssi"));

        assert!(state.user("zed").is_none());
        assert_eq!(state.user("alice").unwrap().hostname.as_deref(), Some("h"));
    }

    #[test]
    fn test_isupport_prefix_and_multi_prefix_names() {
        let mut state = ProtocolState::new();
        feed(
            &mut state,
            &[
                ":irc 001 bob :Welcome",
                ":irc 005 bob PREFIX=(qaohv)~&@%+ CHANTYPES=#! :are supported by this server",
                ":bob!b@h JOIN !chan",
                ":irc 353 bob = !chan :bob ~@alice %+carol",
                ":irc 366 bob !chan :End",
            ],
        );
        let chan = state.channel("!chan").unwrap();
        let alice = chan.member("alice").unwrap();
        assert!(alice.has_mode('q') && alice.has_mode('o'));
        assert_eq!(chan.prefix_of("carol", &state.isupport().prefix()), Some('%'));
        assert!(state.is_channel_name("!chan"));
    }

    #[test]
    fn test_names_refresh_drops_missing_members() {
        let mut state = joined();
        feed(
            &mut state,
            &[
                ":irc 353 bob = #test :bob alice",
                ":irc 366 bob #test :End",
            ],
        );
        assert!(!state.channel("#test").unwrap().has_member("carol"));
        assert!(state.user("carol").is_none());
    }

    #[test]
    fn test_casemapping_change_rekeys() {
        let mut state = ProtocolState::new();
        feed(
            &mut state,
            &[
                ":irc 001 bob :Welcome",
                ":bob!b@h JOIN #Chan[1]",
                ":irc 005 bob CASEMAPPING=ascii :are supported",
            ],
        );
        assert_eq!(state.casemapping(), Casemapping::Ascii);
        assert!(state.channel("#chan[1]").is_some());
        assert!(state.channel("#chan{1}").is_none());
        assert!(state.user("BOB").is_some());
    }

    #[test]
    fn test_motd_accumulates() {
        let mut state = ProtocolState::new();
        let events = feed(
            &mut state,
            &[
                ":irc 375 bob :- irc Message of the day -",
                ":irc 372 bob :- first",
                ":irc 372 bob :- second",
                ":irc 376 bob :End of /MOTD command.",
            ],
        );
        assert_eq!(state.server_info().motd, Some(vec!["first".to_string(), "second".to_string()]));
        assert!(matches!(&events[..], [Event::Motd { lines }] if lines.len() == 2));

        let events = feed(&mut state, &[":irc 422 bob :MOTD File is missing"]);
        assert!(matches!(&events[..], [Event::Motd { lines }] if lines.is_empty()));
    }

    #[test]
    fn test_server_info_and_who() {
        let mut state = joined();
        feed(
            &mut state,
            &[
                ":irc 003 bob :This server was created Mon Jan 1 2024",
                ":irc 004 bob irc.example.com solanum-1.0 DGIRSZaghilopsuwz CFILMPQRSTbcefgijklmnopqrstuvz",
                ":irc 352 bob #test carl carol.host irc.example.com carol H :0 Carol",
            ],
        );
        let info = state.server_info();
        assert_eq!(info.version.as_deref(), Some("solanum-1.0"));
        assert!(info.created.as_deref().unwrap().contains("2024"));
        assert_eq!(
            state.user("carol").unwrap().hostmask().as_deref(),
            Some("carol!carl@carol.host")
        );
    }

    #[test]
    fn test_unknown_commands_change_nothing() {
        let mut state = joined();
        let events = feed(&mut state, &[":irc WALLOPS :hello", ":irc 999 bob :what"]);
        assert!(events.is_empty());
        assert_eq!(state.channel("#test").unwrap().member_count(), 3);
    }

    #[test]
    fn test_foreign_join_to_unknown_channel_ignored() {
        let mut state = joined();
        let events = feed(&mut state, &[":dave!d@h JOIN #elsewhere"]);
        assert!(events.is_empty());
        assert!(state.channel("#elsewhere").is_none());
        assert!(state.user("dave").is_none());
    }

    #[test]
    fn test_topic_for_unseen_channel_creates_it() {
        let mut state = joined();
        feed(&mut state, &[":irc 332 bob #Elsewhere :queried topic"]);
        let chan = state.channel("#elsewhere").unwrap();
        assert_eq!(chan.name, "#Elsewhere");
        assert_eq!(chan.topic.as_deref(), Some("queried topic"));
    }

    #[test]
    fn test_clear() {
        let mut state = joined();
        state.clear();
        assert_eq!(state.channels().count(), 0);
        assert_eq!(state.users().count(), 0);
        assert!(state.server_info().server_name.is_none());
    }
}
