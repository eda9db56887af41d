//! Connection management: lifecycle state machine, transports, the
//! per-connection reader loop, and reconnection backoff.

pub(crate) mod event_loop;
mod machine;
mod reconnect;
mod transport;

pub use machine::{ConnectionState, Session, SessionAction};
pub use reconnect::Backoff;
pub use transport::{BoxedStream, Connector, Stream, TcpConnector};
