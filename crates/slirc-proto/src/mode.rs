//! Mode string parsing (`MODE #chan +ov-k alice bob key`).
//!
//! Whether a mode letter consumes an argument depends on the server, so
//! channel mode parsing takes the ISUPPORT-derived [`PrefixSpec`] and
//! [`ChanModes`].

use std::fmt;

use crate::isupport::{ChanModeKind, ChanModes, PrefixSpec};

/// One mode delta.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeChange {
    /// `true` for `+`, `false` for `-`.
    pub adding: bool,
    /// The mode letter.
    pub mode: char,
    /// The argument consumed by this mode, if any.
    pub arg: Option<String>,
}

impl ModeChange {
    /// Build a change.
    pub fn new(adding: bool, mode: char, arg: Option<&str>) -> Self {
        Self {
            adding,
            mode,
            arg: arg.map(str::to_owned),
        }
    }
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.adding { '+' } else { '-' }, self.mode)?;
        if let Some(arg) = &self.arg {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Walk `+`/`-` runs, asking `takes_arg` whether each letter consumes one
/// of `args`. A mode that wants an argument but has none left gets `None`.
fn walk<'a, F>(modes: &str, args: impl IntoIterator<Item = &'a str>, takes_arg: F) -> Vec<ModeChange>
where
    F: Fn(bool, char) -> bool,
{
    let mut args = args.into_iter();
    let mut adding = true;
    let mut out = Vec::new();

    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                let arg = if takes_arg(adding, c) { args.next() } else { None };
                out.push(ModeChange::new(adding, c, arg));
            }
        }
    }
    out
}

/// Parse a channel mode string and its arguments.
///
/// Membership modes and CHANMODES types A/B always consume an argument,
/// type C only when set, type D and unknown letters never.
///
/// # Example
///
/// ```
/// use slirc_proto::isupport::{ChanModes, PrefixSpec};
/// use slirc_proto::mode::{parse_channel_modes, ModeChange};
///
/// let changes = parse_channel_modes(
///     "+ol-k",
///     ["alice", "10", "secret"],
///     &PrefixSpec::default(),
///     &ChanModes::default(),
/// );
/// assert_eq!(changes, vec![
///     ModeChange::new(true, 'o', Some("alice")),
///     ModeChange::new(true, 'l', Some("10")),
///     ModeChange::new(false, 'k', Some("secret")),
/// ]);
/// ```
pub fn parse_channel_modes<'a>(
    modes: &str,
    args: impl IntoIterator<Item = &'a str>,
    prefix: &PrefixSpec,
    chanmodes: &ChanModes,
) -> Vec<ModeChange> {
    walk(modes, args, |adding, mode| {
        if prefix.is_prefix_mode(mode) {
            return true;
        }
        match chanmodes.kind(mode) {
            Some(ChanModeKind::List) | Some(ChanModeKind::Always) => true,
            Some(ChanModeKind::OnSet) => adding,
            Some(ChanModeKind::Flag) | None => false,
        }
    })
}

/// Parse a user mode string. User modes never take arguments here.
pub fn parse_user_modes(modes: &str) -> Vec<ModeChange> {
    walk(modes, std::iter::empty(), |_, _| false)
}
