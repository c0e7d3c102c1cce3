#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Drives [lnest::handshake::Handshake] sessions over tokio channels, with
//! per-stage deadlines, environment configuration and logging setup.

/// Configuration from the environment
pub mod config;
/// Session driver
pub mod session;
/// Logging setup
pub mod util;

pub use session::{channel_transport, ChannelTransport, Session, SessionOutcome};
