#![crate_name = "lnest"]

//! The channel establishment handshake of a two-party payment channel network.
//! See [`node::Node`] for the entry point and [`handshake::Handshake`] for the
//! state machine.

#![forbid(unsafe_code)]
#![allow(bare_trait_objects)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

#[macro_use]
extern crate alloc;
extern crate core;

pub use bitcoin;

/// Various utilities
#[macro_use]
pub mod util;
/// Errors raised by the handshake
#[macro_use]
pub mod error;
/// Channel identifier and channel record
pub mod channel;
/// Protocol messages
pub mod msgs;
/// Key and commitment derivation
pub mod signer;
/// Transaction and script construction
pub mod tx;
/// Funding source port
pub mod funding;
/// Announcement port
pub mod announce;
/// Persistence
pub mod persist;
/// The establishment state machine
pub mod handshake;
/// Node
pub mod node;

pub use alloc::sync::{Arc, Weak};

/// Common imports
pub mod prelude {
    pub use alloc::{boxed::Box, string::String, vec, vec::Vec};

    pub use alloc::collections::BTreeMap as OrderedMap;
    pub use alloc::collections::BTreeSet as OrderedSet;

    pub use alloc::borrow::ToOwned;
    pub use alloc::string::ToString;

    pub use std::sync::{Mutex, MutexGuard};

    /// Convenience trait for Send + Sync
    pub trait SendSync: Send + Sync {}
}

pub use prelude::SendSync;
