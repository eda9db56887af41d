//! Channel snapshot type.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use slirc_proto::{Casemapping, PrefixSpec};

/// A member's status in one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Nickname as last seen on the wire.
    pub nick: String,
    /// Membership modes (`o`, `v`, ...).
    pub modes: BTreeSet<char>,
}

impl Membership {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            modes: BTreeSet::new(),
        }
    }

    pub fn has_mode(&self, mode: char) -> bool {
        self.modes.contains(&mode)
    }
}

/// A channel we are on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Name as first seen.
    pub name: String,
    pub topic: Option<String>,
    /// Channel modes; type B/C modes carry their argument.
    pub modes: BTreeMap<char, Option<String>>,
    /// Members keyed by casefolded nickname.
    pub(crate) members: HashMap<String, Membership>,
    pub(crate) casemapping: Casemapping,
}

impl Channel {
    pub(crate) fn new(name: &str, casemapping: Casemapping) -> Self {
        Self {
            name: name.to_owned(),
            topic: None,
            modes: BTreeMap::new(),
            members: HashMap::new(),
            casemapping,
        }
    }

    /// Membership of `nick`, compared under the server's casemapping.
    pub fn member(&self, nick: &str) -> Option<&Membership> {
        self.members.get(&self.casemapping.fold(nick))
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.member(nick).is_some()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = &Membership> {
        self.members.values()
    }

    /// Member nicknames, sorted for stable output.
    pub fn nicks(&self) -> Vec<String> {
        let mut nicks: Vec<String> = self.members.values().map(|m| m.nick.clone()).collect();
        nicks.sort();
        nicks
    }

    /// Highest-ranked membership symbol of `nick` (`@`, `+`, ...).
    pub fn prefix_of(&self, nick: &str, prefix: &PrefixSpec) -> Option<char> {
        let member = self.member(nick)?;
        member
            .modes
            .iter()
            .filter_map(|&mode| prefix.rank(mode).map(|rank| (rank, mode)))
            .min()
            .and_then(|(_, mode)| prefix.prefix_for_mode(mode))
    }

    pub fn has_mode(&self, mode: char) -> bool {
        self.modes.contains_key(&mode)
    }

    /// Argument of a set mode such as `k` or `l`.
    pub fn mode_arg(&self, mode: char) -> Option<&str> {
        self.modes.get(&mode).and_then(|arg| arg.as_deref())
    }

    /// Mode string like `+kl key 10`.
    pub fn mode_string(&self) -> String {
        let mut letters = String::from("+");
        let mut args = Vec::new();
        for (mode, arg) in &self.modes {
            letters.push(*mode);
            args.extend(arg.as_deref());
        }
        if args.is_empty() {
            letters
        } else {
            format!("{} {}", letters, args.join(" "))
        }
    }
}
