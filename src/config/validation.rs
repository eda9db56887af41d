//! Configuration validation.
//!
//! Validates configuration at load time to catch common errors early.

use super::Config;
use thiserror::Error;

/// Smallest `limits.max_line_len` that still fits a useful message.
const MIN_LINE_LEN: usize = 64;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.host is required")]
    MissingHost,
    #[error("server.port must not be 0")]
    InvalidPort,
    #[error("identity.nickname is required")]
    MissingNickname,
    #[error("invalid nickname: '{0}'")]
    InvalidNickname(String),
    #[error("reconnect.backoff_ms must contain at least one delay")]
    EmptyBackoff,
    #[error("timing.{0} must be greater than 0")]
    ZeroTimeout(&'static str),
    #[error("timing.ping_interval_ms ({ping}) must be less than timing.inactivity_timeout_ms ({inactivity})")]
    PingIntervalTooLong { ping: u64, inactivity: u64 },
    #[error("limits.max_line_len must be at least {MIN_LINE_LEN}, got {0}")]
    LineLenTooSmall(usize),
    #[error("behavior.autojoin channel '{0}' must start with '#' or '&'")]
    InvalidAutojoinChannel(String),
}

/// Loose nickname check: no whitespace, no characters that would be read
/// as a prefix, channel, or mask, and not starting with a digit or '-'.
fn is_valid_nickname(nick: &str) -> bool {
    let Some(first) = nick.chars().next() else {
        return false;
    };
    if first.is_ascii_digit() || first == '-' {
        return false;
    }
    !nick
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ',' | '!' | '@' | '*' | '?' | ':' | '#' | '&'))
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Server
    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == Some(0) {
        errors.push(ValidationError::InvalidPort);
    }

    // Identity
    let identity = &config.identity;
    if identity.nickname.is_empty() {
        errors.push(ValidationError::MissingNickname);
    }
    for nick in std::iter::once(&identity.nickname)
        .filter(|n| !n.is_empty())
        .chain(&identity.alt_nicknames)
    {
        if !is_valid_nickname(nick) {
            errors.push(ValidationError::InvalidNickname(nick.clone()));
        }
    }

    // Reconnect
    if config.reconnect.backoff_ms.is_empty() {
        errors.push(ValidationError::EmptyBackoff);
    }

    // Timing (a zero rate limit interval is allowed and disables limiting)
    let timing = &config.timing;
    for (name, value) in [
        ("registration_timeout_ms", timing.registration_timeout_ms),
        ("inactivity_timeout_ms", timing.inactivity_timeout_ms),
        ("ping_interval_ms", timing.ping_interval_ms),
        ("handler_timeout_ms", timing.handler_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }
    if timing.ping_interval_ms >= timing.inactivity_timeout_ms {
        errors.push(ValidationError::PingIntervalTooLong {
            ping: timing.ping_interval_ms,
            inactivity: timing.inactivity_timeout_ms,
        });
    }

    // Limits
    if config.limits.max_line_len < MIN_LINE_LEN {
        errors.push(ValidationError::LineLenTooSmall(config.limits.max_line_len));
    }

    // Behavior. The server's CHANTYPES is unknown until 005, so only the
    // RFC defaults are accepted here.
    for entry in &config.behavior.autojoin {
        if !entry.channel.starts_with(['#', '&']) {
            errors.push(ValidationError::InvalidAutojoinChannel(entry.channel.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
