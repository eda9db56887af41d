//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions and loading
//! - [`defaults`]: serde default functions
//! - [`validation`]: load-time validation

mod defaults;
mod types;
mod validation;

pub use types::{
    AutojoinEntry, BehaviorConfig, Config, ConfigError, IdentityConfig, LimitsConfig,
    NickCollisionStrategy, ReconnectConfig, ServerConfig, TimingConfig,
};
pub use validation::{ValidationError, validate};
