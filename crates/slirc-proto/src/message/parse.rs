//! Nom-based IRC message parser.

use std::str::FromStr;

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use super::types::{Message, MAX_MIDDLE_PARAMS};
use crate::command::Command;
use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command token: everything up to the first space.
fn parse_command(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c != ' ')(input)
}

/// Split the parameter section into middle params and an optional trailing.
///
/// Runs of spaces separate parameters. Once fourteen middle parameters have
/// been read, the remainder of the line is the trailing parameter whether
/// or not it carries the `:` marker.
fn parse_params(input: &str) -> (SmallVec<[&str; MAX_MIDDLE_PARAMS]>, Option<&str>) {
    let mut params: SmallVec<[&str; MAX_MIDDLE_PARAMS]> = SmallVec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return (params, None);
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            return (params, Some(trailing));
        }

        if params.len() == MAX_MIDDLE_PARAMS {
            return (params, Some(rest));
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }
}

/// Borrowed view of a parsed line.
struct ParsedLine<'a> {
    prefix: Option<&'a str>,
    command: &'a str,
    params: SmallVec<[&'a str; MAX_MIDDLE_PARAMS]>,
    trailing: Option<&'a str>,
}

fn parse_line(input: &str) -> IResult<&str, ParsedLine<'_>> {
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (params, trailing) = parse_params(input);

    Ok((
        "",
        ParsedLine {
            prefix,
            command,
            params,
            trailing,
        },
    ))
}

impl Message {
    /// Parse one framed line (without its terminator) into a message.
    pub fn parse(line: &str) -> Result<Message, MessageParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim_matches(' ').is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }
        if line.trim_start_matches(' ') == ":" {
            return Err(MessageParseError::InvalidPrefix(line.to_owned()));
        }

        let (_, parsed) = parse_line(line).map_err(|_| MessageParseError::InvalidCommand)?;

        Ok(Message {
            prefix: parsed.prefix.map(Prefix::new_from_str),
            command: Command::parse(parsed.command)?,
            params: parsed.params.iter().map(|p| (*p).to_owned()).collect(),
            trailing: parsed.trailing.map(str::to_owned),
        })
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s).map_err(|cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        })
    }
}
