//! IRC case-mapping functions.
//!
//! IRC uses a special case-insensitive comparison where some characters
//! are considered equivalent (e.g., `[` and `{`). The mapping in effect is
//! advertised by the server through the `CASEMAPPING` ISUPPORT token;
//! `rfc1459` is the most common and the default when nothing is advertised.

use std::fmt;

/// Convert a single character to IRC lowercase using RFC 1459 case mapping.
///
/// In addition to ASCII lowercase conversion, this maps:
/// - `[` → `{`
/// - `]` → `}`
/// - `\` → `|`
/// - `~` → `^`
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Convert a string to IRC lowercase using RFC 1459 case mapping.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Compare two strings using IRC case-insensitive comparison.
///
/// Uses the RFC 1459 case mapping where certain characters are equivalent.
pub fn irc_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.chars()
        .zip(b.chars())
        .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}

/// A server-advertised case mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Casemapping {
    /// `rfc1459`: ASCII plus `[]\~` ↔ `{}|^`.
    #[default]
    Rfc1459,
    /// `strict-rfc1459`: ASCII plus `[]\` ↔ `{}|` (no tilde).
    StrictRfc1459,
    /// `ascii`: only `A-Z` ↔ `a-z`.
    Ascii,
}

impl Casemapping {
    /// Parse a `CASEMAPPING` token value. Unknown mappings fall back to `rfc1459`.
    pub fn from_token(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "ascii" => Casemapping::Ascii,
            "strict-rfc1459" => Casemapping::StrictRfc1459,
            _ => Casemapping::Rfc1459,
        }
    }

    /// Lowercase one character under this mapping.
    #[inline]
    pub const fn lower_char(self, c: char) -> char {
        match self {
            Casemapping::Rfc1459 => irc_lower_char(c),
            Casemapping::StrictRfc1459 => match c {
                '~' => '~',
                _ => irc_lower_char(c),
            },
            Casemapping::Ascii => c.to_ascii_lowercase(),
        }
    }

    /// Fold a name to its canonical lookup key.
    pub fn fold(self, s: &str) -> String {
        s.chars().map(|c| self.lower_char(c)).collect()
    }

    /// Compare two names under this mapping.
    pub fn equals(self, a: &str, b: &str) -> bool {
        a.len() == b.len()
            && a
                .chars()
                .zip(b.chars())
                .all(|(ca, cb)| self.lower_char(ca) == self.lower_char(cb))
    }

    /// The token value as advertised by servers.
    pub fn as_str(self) -> &'static str {
        match self {
            Casemapping::Rfc1459 => "rfc1459",
            Casemapping::StrictRfc1459 => "strict-rfc1459",
            Casemapping::Ascii => "ascii",
        }
    }
}

impl fmt::Display for Casemapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
