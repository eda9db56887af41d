//! Protocol state tracking.
//!
//! Contains the per-connection [`ProtocolState`] and the snapshot types
//! handed to consumers.

mod channel;
mod tracker;
mod user;

pub use channel::{Channel, Membership};
pub use tracker::{ProtocolState, ServerInfo};
pub use user::User;
