//! User snapshot type.

use std::collections::BTreeMap;

use slirc_proto::Casemapping;

/// A user sharing at least one channel with us (or us).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub nickname: String,
    pub username: Option<String>,
    pub hostname: Option<String>,
    /// Shared channels: casefolded name to display name.
    pub(crate) channels: BTreeMap<String, String>,
    pub(crate) casemapping: Casemapping,
}

impl User {
    pub(crate) fn new(nickname: &str, casemapping: Casemapping) -> Self {
        Self {
            nickname: nickname.to_owned(),
            username: None,
            hostname: None,
            channels: BTreeMap::new(),
            casemapping,
        }
    }

    pub fn is_on(&self, channel: &str) -> bool {
        self.channels.contains_key(&self.casemapping.fold(channel))
    }

    /// Channel display names.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.values().map(String::as_str)
    }

    /// `nick!user@host`, once both parts are known.
    pub fn hostmask(&self) -> Option<String> {
        match (&self.username, &self.hostname) {
            (Some(user), Some(host)) => Some(format!("{}!{}@{}", self.nickname, user, host)),
            _ => None,
        }
    }

    /// Record username/hostname from a prefix or WHO reply.
    pub(crate) fn learn(&mut self, username: Option<&str>, hostname: Option<&str>) {
        if let Some(user) = username.filter(|u| !u.is_empty()) {
            self.username = Some(user.to_owned());
        }
        if let Some(host) = hostname.filter(|h| !h.is_empty()) {
            self.hostname = Some(host.to_owned());
        }
    }
}
