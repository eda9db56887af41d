//! Reconnection backoff schedule.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Walks the configured delay schedule. The last delay repeats; an optional
/// attempt cap ends the walk.
#[derive(Debug, Clone)]
pub struct Backoff {
    delays: Vec<Duration>,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            delays: config.backoff_ms.iter().copied().map(Duration::from_millis).collect(),
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the cap is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.attempt >= max) {
            return None;
        }
        let index = (self.attempt as usize).min(self.delays.len().saturating_sub(1));
        let delay = self.delays.get(index).copied().unwrap_or_default();
        self.attempt += 1;
        Some(delay)
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Start over; called once a connection registers successfully.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
