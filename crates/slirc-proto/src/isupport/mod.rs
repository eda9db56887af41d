//! ISUPPORT (RPL_ISUPPORT / 005) tracking.
//!
//! Servers advertise limits and features across one or more 005 lines.
//! [`Isupport`] accumulates those tokens and answers the questions a client
//! needs: which prefixes mean what, how modes take arguments, how names are
//! case-folded and how long a line may be.
//!
//! # Reference
//! - Modern IRC documentation: <https://modern.ircdocs.horse/isupport.html>

mod tokens;

use std::collections::BTreeMap;

pub use tokens::{ChanModeKind, ChanModes, PrefixSpec};

use crate::casemap::Casemapping;
use crate::line::DEFAULT_MAX_LINE_LEN;
use crate::message::Message;
use crate::response::Response;

/// Channel prefixes assumed when `CHANTYPES` is absent.
pub const DEFAULT_CHANTYPES: &str = "#&";

/// Accumulated server ISUPPORT tokens.
///
/// # Example
///
/// ```
/// use slirc_proto::{Isupport, Message};
///
/// let mut isupport = Isupport::new();
/// let reply = Message::parse(":srv 005 me NETWORK=TestNet CHANTYPES=# :are supported").unwrap();
/// assert!(isupport.apply_reply(&reply));
/// assert_eq!(isupport.network(), Some("TestNet"));
/// assert!(isupport.is_channel_name("#rust"));
/// assert!(!isupport.is_channel_name("&local"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Isupport {
    tokens: BTreeMap<String, Option<String>>,
}

impl Isupport {
    /// An empty token set; every accessor returns its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `KEY`, `KEY=VALUE` and `-KEY` tokens.
    pub fn apply_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for token in tokens {
            if token.is_empty() {
                continue;
            }
            if let Some(key) = token.strip_prefix('-') {
                self.tokens.remove(&key.to_ascii_uppercase());
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key, Some(unescape_value(value))),
                None => (token, None),
            };
            self.tokens.insert(key.to_ascii_uppercase(), value);
        }
    }

    /// Apply a 005 reply. Returns false if `msg` is not `RPL_ISUPPORT`.
    ///
    /// The first parameter is our nickname and the trailing is human text;
    /// only the middle parameters in between are tokens.
    pub fn apply_reply(&mut self, msg: &Message) -> bool {
        if !msg.is_response(Response::RPL_ISUPPORT) {
            return false;
        }
        self.apply_tokens(msg.params.iter().skip(1).map(String::as_str));
        true
    }

    /// Raw lookup: `Some(Some(v))` for `KEY=v`, `Some(None)` for bare `KEY`.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.tokens
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    /// True if the token was advertised in any form.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate all tokens in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Forget everything (new connection).
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    /// `PREFIX`, or `(ov)@+` when absent or malformed.
    pub fn prefix(&self) -> PrefixSpec {
        self.value("PREFIX")
            .and_then(PrefixSpec::parse)
            .unwrap_or_default()
    }

    /// `CHANMODES`, or `beI,k,l,imnpst` when absent or malformed.
    pub fn chanmodes(&self) -> ChanModes {
        self.value("CHANMODES")
            .and_then(ChanModes::parse)
            .unwrap_or_default()
    }

    /// `CHANTYPES`, or `#&`.
    pub fn chantypes(&self) -> &str {
        match self.get("CHANTYPES") {
            Some(Some(types)) => types,
            // A bare CHANTYPES token means the server has no channels.
            Some(None) => "",
            None => DEFAULT_CHANTYPES,
        }
    }

    /// `CASEMAPPING`, or `rfc1459`.
    pub fn casemapping(&self) -> Casemapping {
        self.value("CASEMAPPING")
            .map(Casemapping::from_token)
            .unwrap_or_default()
    }

    /// `LINELEN` including CRLF, or 512. Values below 512 are ignored.
    pub fn linelen(&self) -> usize {
        self.value("LINELEN")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n >= DEFAULT_MAX_LINE_LEN)
            .unwrap_or(DEFAULT_MAX_LINE_LEN)
    }

    /// `NICKLEN`, if advertised.
    pub fn nicklen(&self) -> Option<usize> {
        self.value("NICKLEN").and_then(|v| v.parse().ok())
    }

    /// `NETWORK`, if advertised.
    pub fn network(&self) -> Option<&str> {
        self.value("NETWORK")
    }

    /// True if `name` starts with one of the server's channel prefixes.
    pub fn is_channel_name(&self, name: &str) -> bool {
        name.chars()
            .next()
            .is_some_and(|c| self.chantypes().contains(c))
    }
}

/// Decode `\xHH` escapes used in ISUPPORT values.
fn unescape_value(value: &str) -> String {
    if !value.contains("\\x") {
        return value.to_owned();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find("\\x") {
        out.push_str(&rest[..pos]);
        let hex = rest.get(pos + 2..pos + 4);
        match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
            Some(byte) if byte.is_ascii() => {
                out.push(char::from(byte));
                rest = &rest[pos + 4..];
            }
            _ => {
                out.push_str("\\x");
                rest = &rest[pos + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}
