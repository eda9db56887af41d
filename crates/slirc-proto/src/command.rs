//! IRC command token: a command word or a three-digit numeric.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;
use crate::response::Response;

/// The command slot of an IRC message.
///
/// Exactly one form applies: alphabetic command words are normalized to
/// uppercase, numerics are exactly three ASCII digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// A command word such as `PRIVMSG` (always uppercase).
    Named(String),
    /// A numeric reply code such as `001`.
    Numeric(u16),
}

impl Command {
    /// Build a named command, uppercasing it.
    pub fn named(name: &str) -> Self {
        Command::Named(name.to_ascii_uppercase())
    }

    /// Parse a command token.
    ///
    /// RFC 2812: `command = 1*letter / 3digit`.
    pub fn parse(token: &str) -> Result<Self, MessageParseError> {
        if token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()) {
            // Three ASCII digits always fit in u16.
            let code = token
                .parse::<u16>()
                .map_err(|_| MessageParseError::InvalidCommand)?;
            return Ok(Command::Numeric(code));
        }
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Ok(Command::named(token));
        }
        Err(MessageParseError::InvalidCommand)
    }

    /// The numeric code, if this is a numeric reply.
    pub fn numeric(&self) -> Option<u16> {
        match self {
            Command::Numeric(code) => Some(*code),
            Command::Named(_) => None,
        }
    }

    /// The known [`Response`] for numeric commands.
    pub fn response(&self) -> Option<Response> {
        self.numeric().and_then(Response::from_code)
    }

    /// The command word, if this is a named command.
    pub fn name(&self) -> Option<&str> {
        match self {
            Command::Named(name) => Some(name),
            Command::Numeric(_) => None,
        }
    }

    /// Case-insensitive check against a command word.
    pub fn is(&self, name: &str) -> bool {
        matches!(self, Command::Named(n) if n.eq_ignore_ascii_case(name))
    }
}

impl From<Response> for Command {
    fn from(resp: Response) -> Self {
        Command::Numeric(resp.code())
    }
}

impl FromStr for Command {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Named(name) => f.write_str(name),
            Command::Numeric(code) => write!(f, "{:03}", code),
        }
    }
}
