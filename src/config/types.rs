//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::validation::{ValidationError, validate};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where to connect.
    pub server: ServerConfig,
    /// Who we are.
    pub identity: IdentityConfig,
    /// Reconnection policy after an unintentional disconnect.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Rate limit and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Wire limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Built-in behaviors (autojoin, NickServ, CTCP).
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

impl Config {
    /// Minimal configuration with every optional setting at its default.
    pub fn new(host: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                host: host.into(),
                port: None,
                tls: false,
                password: None,
            },
            identity: IdentityConfig {
                nickname: nickname.into(),
                alt_nicknames: Vec::new(),
                username: None,
                realname: None,
                nick_collision: NickCollisionStrategy::default(),
                max_nick_attempts: default_max_nick_attempts(),
            },
            reconnect: ReconnectConfig::default(),
            timing: TimingConfig::default(),
            limits: LimitsConfig::default(),
            behavior: BehaviorConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

/// Server endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Hostname or address (e.g., "irc.libera.chat").
    pub host: String,
    /// Port; 6667, or 6697 when `tls` is set.
    pub port: Option<u16>,
    /// Wrap the connection in TLS.
    #[serde(default)]
    pub tls: bool,
    /// Connection password, sent as PASS before NICK/USER.
    pub password: Option<String>,
}

impl ServerConfig {
    /// Effective port.
    pub fn port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None if self.tls => default_tls_port(),
            None => default_plain_port(),
        }
    }
}

/// What to do when the server rejects every configured nickname.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NickCollisionStrategy {
    /// Keep appending `_` to the last attempt.
    #[default]
    AppendUnderscore,
    /// Give up and disconnect.
    Fail,
}

/// Registration identity.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Preferred nickname.
    pub nickname: String,
    /// Tried in order when the nickname is rejected during registration.
    #[serde(default)]
    pub alt_nicknames: Vec<String>,
    /// USER username (defaults to the nickname).
    pub username: Option<String>,
    /// USER realname (defaults to the nickname).
    pub realname: Option<String>,
    /// Fallback once the alternates run out.
    #[serde(default)]
    pub nick_collision: NickCollisionStrategy,
    /// Total retries after the first rejection.
    #[serde(default = "default_max_nick_attempts")]
    pub max_nick_attempts: u32,
}

impl IdentityConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nickname)
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect after unintentional disconnects.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay schedule in milliseconds; the last entry repeats.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,
    /// Give up after this many consecutive failed attempts (unlimited if unset).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff_ms: default_backoff_ms(),
            max_attempts: None,
        }
    }
}

/// Rate limiting and timeouts, all in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Minimum gap between queued writes. Zero disables rate limiting.
    #[serde(default = "default_rate_limit_interval_ms")]
    pub rate_limit_interval_ms: u64,
    /// Time allowed between transport setup and 001.
    #[serde(default = "default_registration_timeout_ms")]
    pub registration_timeout_ms: u64,
    /// Silence after which the connection is considered dead.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
    /// Silence after which we probe the server with PING.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Per-handler time budget before it is cancelled.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            rate_limit_interval_ms: default_rate_limit_interval_ms(),
            registration_timeout_ms: default_registration_timeout_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            handler_timeout_ms: default_handler_timeout_ms(),
        }
    }
}

impl TimingConfig {
    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

/// Wire limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Longest accepted inbound line, CRLF included. A larger LINELEN
    /// advertised by the server raises it for that connection.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_len: default_max_line_len(),
        }
    }
}

/// A channel joined automatically after registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutojoinEntry {
    pub channel: String,
    pub key: Option<String>,
}

/// Built-in behaviors.
#[derive(Debug, Clone, Deserialize)]
pub struct BehaviorConfig {
    /// Queue commands issued before 001 instead of failing them.
    #[serde(default = "default_true")]
    pub queue_before_registration: bool,
    /// Channels joined once registered.
    #[serde(default)]
    pub autojoin: Vec<AutojoinEntry>,
    /// Sent to NickServ as `IDENTIFY <password>` once registered.
    pub nickserv_password: Option<String>,
    /// Reply text for CTCP VERSION.
    #[serde(default = "default_ctcp_version")]
    pub ctcp_version: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            queue_before_registration: true,
            autojoin: Vec::new(),
            nickserv_password: None,
            ctcp_version: default_ctcp_version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml_str(
            r#"
[server]
host = "irc.example.com"

[identity]
nickname = "bob"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port(), 6667);
        assert_eq!(config.identity.username(), "bob");
        assert_eq!(config.identity.realname(), "bob");
        assert_eq!(config.identity.nick_collision, NickCollisionStrategy::AppendUnderscore);
        assert_eq!(config.identity.max_nick_attempts, 5);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.backoff_ms, vec![1_000, 2_000, 5_000, 10_000, 30_000]);
        assert_eq!(config.timing.rate_limit_interval(), Duration::from_secs(1));
        assert_eq!(config.limits.max_line_len, 512);
        assert!(config.behavior.queue_before_registration);
        assert!(config.behavior.ctcp_version.starts_with("slirc-client "));
    }

    #[test]
    fn test_tls_port_default() {
        let config = Config::from_toml_str(
            r#"
[server]
host = "irc.example.com"
tls = true

[identity]
nickname = "bob"
"#,
        )
        .unwrap();
        assert_eq!(config.server.port(), 6697);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r##"
[server]
host = "irc.example.com"
port = 7000
password = "hunter2"

[identity]
nickname = "bob"
alt_nicknames = ["bob2", "bobby"]
username = "bobbot"
realname = "Bob the Bot"
nick_collision = "fail"

[reconnect]
enabled = false
backoff_ms = [500]
max_attempts = 3

[timing]
rate_limit_interval_ms = 0
ping_interval_ms = 30000

[behavior]
queue_before_registration = false
nickserv_password = "secret"
ctcp_version = "bob 1.0"

[[behavior.autojoin]]
channel = "#rust"

[[behavior.autojoin]]
channel = "#private"
key = "letmein"
"##,
        )
        .unwrap();

        assert_eq!(config.server.port(), 7000);
        assert_eq!(config.server.password.as_deref(), Some("hunter2"));
        assert_eq!(config.identity.alt_nicknames, vec!["bob2", "bobby"]);
        assert_eq!(config.identity.username(), "bobbot");
        assert_eq!(config.identity.nick_collision, NickCollisionStrategy::Fail);
        assert!(!config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.timing.rate_limit_interval_ms, 0);
        assert!(!config.behavior.queue_before_registration);
        assert_eq!(config.behavior.autojoin.len(), 2);
        assert_eq!(config.behavior.autojoin[1].key.as_deref(), Some("letmein"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Config::from_toml_str(
            r#"
[server]
host = ""

[identity]
nickname = "bob"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("server.host is required"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/slirc.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
