use crate::command::Command;
use crate::prefix::Prefix;
use crate::response::Response;

/// Maximum number of middle (non-trailing) parameters (RFC 2812).
pub const MAX_MIDDLE_PARAMS: usize = 14;

/// An owned IRC message.
///
/// Immutable once parsed: `[:prefix] COMMAND [params...] [:trailing]`.
/// The trailing parameter, when present, is the last logical argument and
/// may contain spaces.
///
/// # Example
///
/// ```
/// use slirc_proto::{Command, Message};
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello there".parse().unwrap();
/// assert_eq!(msg.command, Command::Named("PRIVMSG".into()));
/// assert_eq!(msg.params, vec!["#channel"]);
/// assert_eq!(msg.trailing.as_deref(), Some("Hello there"));
///
/// let out = Message::privmsg("#channel", "Hello!");
/// assert_eq!(out.to_string(), "PRIVMSG #channel :Hello!");
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Message prefix/source (e.g., `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// The command word or numeric.
    pub command: Command,
    /// Middle parameters, in order (at most [`MAX_MIDDLE_PARAMS`]).
    pub params: Vec<String>,
    /// Trailing parameter, without its `:` marker.
    pub trailing: Option<String>,
}

impl Message {
    /// Assemble a message from its parts.
    ///
    /// Arguments are middle parameters up to the first one that cannot be
    /// sent as one (empty, contains a space, or starts with `:`), or up to
    /// [`MAX_MIDDLE_PARAMS`]. That argument and every later one are joined
    /// with single spaces into the trailing parameter, which is how the line
    /// parses back.
    pub fn new<I, S>(command: Command, args: I) -> Message
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut params: Vec<String> = args.into_iter().map(Into::into).collect();
        let split = params
            .iter()
            .take(MAX_MIDDLE_PARAMS)
            .position(|arg| !is_middle(arg))
            .unwrap_or(MAX_MIDDLE_PARAMS);
        let trailing = match params.len() {
            len if len <= split => None,
            len if len == split + 1 => params.pop(),
            _ => Some(params.split_off(split).join(" ")),
        };
        Message {
            prefix: None,
            command,
            params,
            trailing,
        }
    }

    fn with_trailing(command: &str, params: Vec<String>, trailing: impl Into<String>) -> Message {
        Message {
            prefix: None,
            command: Command::named(command),
            params,
            trailing: Some(trailing.into()),
        }
    }

    /// Attach a prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Message {
        self.prefix = Some(prefix);
        self
    }

    /// `PRIVMSG <target> :<text>`
    pub fn privmsg(target: &str, text: &str) -> Message {
        Message::with_trailing("PRIVMSG", vec![target.to_owned()], text)
    }

    /// `NOTICE <target> :<text>`
    pub fn notice(target: &str, text: &str) -> Message {
        Message::with_trailing("NOTICE", vec![target.to_owned()], text)
    }

    /// `JOIN <channel> [key]`
    pub fn join(channel: &str, key: Option<&str>) -> Message {
        let mut args = vec![channel];
        args.extend(key);
        Message::new(Command::named("JOIN"), args)
    }

    /// `PART <channel> [:reason]`
    pub fn part(channel: &str, reason: Option<&str>) -> Message {
        match reason {
            Some(reason) => Message::with_trailing("PART", vec![channel.to_owned()], reason),
            None => Message::new(Command::named("PART"), [channel]),
        }
    }

    /// `NICK <nickname>`
    pub fn nick(nickname: &str) -> Message {
        Message::new(Command::named("NICK"), [nickname])
    }

    /// `USER <username> 0 * :<realname>`
    pub fn user(username: &str, realname: &str) -> Message {
        Message::with_trailing(
            "USER",
            vec![username.to_owned(), "0".to_owned(), "*".to_owned()],
            realname,
        )
    }

    /// `PASS <password>`
    pub fn pass(password: &str) -> Message {
        Message::new(Command::named("PASS"), [password])
    }

    /// `PING :<token>`
    pub fn ping(token: &str) -> Message {
        Message::with_trailing("PING", Vec::new(), token)
    }

    /// `PONG :<token>`
    pub fn pong(token: &str) -> Message {
        Message::with_trailing("PONG", Vec::new(), token)
    }

    /// `QUIT [:reason]`
    pub fn quit(reason: Option<&str>) -> Message {
        match reason {
            Some(reason) => Message::with_trailing("QUIT", Vec::new(), reason),
            None => Message::new(Command::named("QUIT"), Vec::<String>::new()),
        }
    }

    /// `MODE <target> <modes> [args...]`
    pub fn mode(target: &str, modes: &str, args: &[&str]) -> Message {
        let mut all = vec![target, modes];
        all.extend_from_slice(args);
        Message::new(Command::named("MODE"), all)
    }

    /// `TOPIC <channel> [:topic]`; without a topic this queries it.
    pub fn topic(channel: &str, topic: Option<&str>) -> Message {
        match topic {
            Some(topic) => Message::with_trailing("TOPIC", vec![channel.to_owned()], topic),
            None => Message::new(Command::named("TOPIC"), [channel]),
        }
    }

    /// Nickname of the sender, when the prefix is a user mask.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Number of logical arguments (middle params plus trailing).
    pub fn arg_count(&self) -> usize {
        self.params.len() + usize::from(self.trailing.is_some())
    }

    /// Logical argument `index`, treating the trailing as the last one.
    pub fn arg(&self, index: usize) -> Option<&str> {
        match self.params.get(index) {
            Some(param) => Some(param),
            None if index == self.params.len() => self.trailing.as_deref(),
            None => None,
        }
    }

    /// All logical arguments in order.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(String::as_str)
            .chain(self.trailing.as_deref())
    }

    /// The final logical argument (usually the human-readable text).
    pub fn last_arg(&self) -> Option<&str> {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
    }

    /// Returns true when this is the given known numeric.
    pub fn is_response(&self, resp: Response) -> bool {
        self.command.numeric() == Some(resp.code())
    }
}

fn is_middle(arg: &str) -> bool {
    !arg.is_empty() && !arg.contains(' ') && !arg.starts_with(':')
}
