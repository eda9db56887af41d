//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_plain_port() -> u16 {
    6667
}

pub fn default_tls_port() -> u16 {
    6697
}

// =============================================================================
// Identity Defaults
// =============================================================================

pub fn default_max_nick_attempts() -> u32 {
    5
}

// =============================================================================
// Reconnect Defaults
// =============================================================================

/// Delays between reconnection attempts; the last value repeats.
pub fn default_backoff_ms() -> Vec<u64> {
    vec![1_000, 2_000, 5_000, 10_000, 30_000]
}

// =============================================================================
// Timing Defaults (milliseconds)
// =============================================================================

pub fn default_rate_limit_interval_ms() -> u64 {
    1_000
}

pub fn default_registration_timeout_ms() -> u64 {
    30_000
}

pub fn default_inactivity_timeout_ms() -> u64 {
    120_000
}

pub fn default_ping_interval_ms() -> u64 {
    60_000
}

pub fn default_handler_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Limits Defaults
// =============================================================================

/// RFC 2812 line limit, CRLF included.
pub fn default_max_line_len() -> usize {
    slirc_proto::DEFAULT_MAX_LINE_LEN
}

// =============================================================================
// Behavior Defaults
// =============================================================================

pub fn default_ctcp_version() -> String {
    format!("slirc-client {}", env!("CARGO_PKG_VERSION"))
}
